use crate::utils::error::{ExportError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: &str, reason: impl Into<String>) -> ExportError {
    ExportError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(invalid(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(invalid(
            field_name,
            url_str,
            format!("Invalid URL format: {}", e),
        )),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(invalid(
            field_name,
            &value.to_string(),
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

/// 憑證類設定若仍含 `${VAR}`，代表環境變數沒有設定
pub fn validate_resolved(field_name: &str, value: &str) -> Result<()> {
    if value.contains("${") {
        // 不把原值寫進錯誤，避免憑證片段外洩到日誌
        return Err(invalid(
            field_name,
            "<redacted>",
            "Environment variable placeholder was not resolved",
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field_name,
            &value.to_string(),
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

/// 下載用檔名只允許單一層級，拒絕任何路徑成分
pub fn validate_file_name(field_name: &str, name: &str) -> Result<()> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
        || name.contains("..")
    {
        return Err(invalid(field_name, name, "Not a plain file name"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("enrichment.base_url", "https://example.com").is_ok());
        assert!(validate_url("enrichment.base_url", "http://example.com").is_ok());
        assert!(validate_url("enrichment.base_url", "").is_err());
        assert!(validate_url("enrichment.base_url", "invalid-url").is_err());
        assert!(validate_url("enrichment.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("server.max_upload_mb", 5, 1).is_ok());
        assert!(validate_positive_number("server.max_upload_mb", 0, 1).is_err());
    }

    #[test]
    fn test_validate_resolved() {
        assert!(validate_resolved("enrichment.auth_token", "abc123").is_ok());
        let err = validate_resolved("enrichment.auth_token", "${MISSING}").unwrap_err();
        assert!(!err.to_string().contains("MISSING"));
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("filename", "expired-customers-2024-01-01-T101010.csv").is_ok());
        assert!(validate_file_name("filename", "../secret.csv").is_err());
        assert!(validate_file_name("filename", "a/b.csv").is_err());
        assert!(validate_file_name("filename", "a\\b.csv").is_err());
        assert!(validate_file_name("filename", "").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("enrichment.timeout_seconds", 10, 1, 300).is_ok());
        assert!(validate_range("enrichment.timeout_seconds", 0, 1, 300).is_err());
    }
}
