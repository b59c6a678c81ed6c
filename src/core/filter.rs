use crate::core::Record;
use crate::domain::model::CUSTOMER_GROUP;
use crate::utils::error::{ExportError, Result};

/// 允許匯出的客戶群組（小寫比對）
pub const ALLOWED_GROUPS: [&str; 4] = [
    "gold service club",
    "gold service club - h2o",
    "platinum service club",
    "platinum service club - h2o",
];

pub fn is_allowed_group(group: &str) -> bool {
    let normalized = group.to_lowercase();
    ALLOWED_GROUPS.contains(&normalized.as_str())
}

/// 缺少群組欄位視為輸入格式錯誤，不會默默略過
pub fn keep(record: &Record) -> Result<bool> {
    record
        .get(CUSTOMER_GROUP)
        .map(is_allowed_group)
        .ok_or_else(|| ExportError::decode(format!("record is missing the '{}' field", CUSTOMER_GROUP)))
}

/// 保留順序的子序列
pub fn filter_records<I>(records: I) -> Result<Vec<Record>>
where
    I: IntoIterator<Item = Record>,
{
    let mut kept = Vec::new();
    for record in records {
        if keep(&record)? {
            kept.push(record);
        }
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, group: &str) -> Record {
        [("Customer ID", id), (CUSTOMER_GROUP, group)].into_iter().collect()
    }

    #[test]
    fn test_allow_set_is_case_insensitive() {
        assert!(is_allowed_group("Gold Service Club"));
        assert!(is_allowed_group("PLATINUM SERVICE CLUB - H2O"));
        assert!(!is_allowed_group("bronze"));
        assert!(!is_allowed_group("gold service club "));
        assert!(!is_allowed_group(""));
    }

    #[test]
    fn test_filter_preserves_order_and_is_idempotent() {
        let records = vec![
            record("1", "Gold Service Club"),
            record("2", "Bronze"),
            record("3", "platinum service club - h2o"),
            record("4", "gold service club - h2o"),
        ];

        let once = filter_records(records).unwrap();
        let ids: Vec<_> = once.iter().filter_map(|r| r.get("Customer ID")).collect();
        assert_eq!(ids, vec!["1", "3", "4"]);

        let twice = filter_records(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_group_field_fails() {
        let records = vec![[("Customer ID", "1")].into_iter().collect::<Record>()];
        assert!(matches!(
            filter_records(records),
            Err(ExportError::DecodeMalformed { .. })
        ));
    }
}
