use crate::core::Record;
use crate::domain::model::{CUSTOMER_NAME, DATE_JOINED, EXPIRATION_DATE, NOT_AVAILABLE};

/// 匯出檔正常情況下的欄位數
pub const EXPECTED_WIDTH: usize = 5;

/// 名稱含有未跳脫的逗號時會被拆成多欄；把多出的尾端欄位以 `,` 接回 Customer Name。
/// 回傳是否有進行修補。
pub fn repair_overflow(record: &mut Record, width: usize) -> bool {
    if record.len() <= width {
        return false;
    }

    let surplus: Vec<String> = record.keys().skip(width).map(str::to_string).collect();
    let merged = surplus
        .iter()
        .filter_map(|key| record.remove(key))
        .collect::<Vec<_>>()
        .join(",");

    tracing::debug!(
        "Merged {} overflow fields into '{}'",
        surplus.len(),
        CUSTOMER_NAME
    );
    record.insert(CUSTOMER_NAME, merged);
    true
}

pub fn rewrite(record: &mut Record, expiration: Option<String>) {
    record.remove(DATE_JOINED);
    let value = expiration.unwrap_or_else(|| NOT_AVAILABLE.to_string());
    record.insert(EXPIRATION_DATE, value);
}
