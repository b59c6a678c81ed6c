use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No input file was provided")]
    InputMissing,

    #[error("Malformed CSV input: {message}")]
    DecodeMalformed { message: String },

    #[error("No records matched the allowed customer groups")]
    NoMatchingRecords,

    /// 單筆查詢失敗，只會降級為 N/A，不會中止整個執行
    #[error("Attribute lookup unavailable: {message}")]
    EnrichmentUnavailable { message: String },

    #[error("No transformed records to encode")]
    EncodeEmpty,

    #[error("CSV encoding failed: {message}")]
    EncodeFault { message: String },

    /// 觀察者已斷線或佇列已滿，更新直接丟棄
    #[error("Progress observer unavailable")]
    ObserverUnavailable,

    #[error("Another export run is already in progress")]
    RunInProgress,

    #[error("Export run was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Upstream,
    Output,
    Runtime,
    Configuration,
}

impl ExportError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::DecodeMalformed {
            message: message.into(),
        }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::EncodeFault {
            message: message.into(),
        }
    }

    /// 穩定的錯誤代碼，供 HTTP 回應與 CLI 使用
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputMissing => "input_missing",
            Self::DecodeMalformed { .. } => "decode_malformed",
            Self::NoMatchingRecords => "no_matching_records",
            Self::EnrichmentUnavailable { .. } => "enrichment_unavailable",
            Self::EncodeEmpty => "encode_empty",
            Self::EncodeFault { .. } => "encode_fault",
            Self::ObserverUnavailable => "observer_unavailable",
            Self::RunInProgress => "run_in_progress",
            Self::Cancelled => "cancelled",
            Self::IoError(_) => "io_error",
            Self::ConfigError { .. } => "config_error",
            Self::InvalidConfigValueError { .. } => "invalid_config_value",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InputMissing | Self::DecodeMalformed { .. } | Self::NoMatchingRecords => {
                ErrorCategory::Input
            }
            Self::EnrichmentUnavailable { .. } => ErrorCategory::Upstream,
            Self::EncodeEmpty | Self::EncodeFault { .. } | Self::IoError(_) => {
                ErrorCategory::Output
            }
            Self::ObserverUnavailable | Self::RunInProgress | Self::Cancelled => {
                ErrorCategory::Runtime
            }
            Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
        }
    }

    /// 查詢與進度推送的錯誤在發生處被吸收，其餘都會終止執行
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::EnrichmentUnavailable { .. } | Self::ObserverUnavailable
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::InputMissing => "No file uploaded.".to_string(),
            Self::DecodeMalformed { message } => {
                format!("The uploaded file could not be read as CSV: {}", message)
            }
            Self::NoMatchingRecords => {
                "No customers found matching the specified groups.".to_string()
            }
            Self::EncodeEmpty => "No transformed customers to write to CSV.".to_string(),
            Self::EncodeFault { .. } | Self::IoError(_) => "Error writing CSV file.".to_string(),
            Self::RunInProgress => "Another export is already running.".to_string(),
            Self::Cancelled => "The export was cancelled.".to_string(),
            Self::EnrichmentUnavailable { .. } => {
                "The customer attribute service is unavailable.".to_string()
            }
            Self::ObserverUnavailable => "Progress updates are unavailable.".to_string(),
            Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                format!("Invalid configuration: {}", self)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_lookup_and_observer_errors_are_absorbed() {
        assert!(!ExportError::EnrichmentUnavailable {
            message: "timeout".to_string()
        }
        .is_fatal());
        assert!(!ExportError::ObserverUnavailable.is_fatal());
        assert!(ExportError::NoMatchingRecords.is_fatal());
        assert!(ExportError::decode("bad quote").is_fatal());
        assert!(ExportError::EncodeEmpty.is_fatal());
    }

    #[test]
    fn test_codes_and_messages() {
        assert_eq!(ExportError::NoMatchingRecords.code(), "no_matching_records");
        assert_eq!(
            ExportError::NoMatchingRecords.user_friendly_message(),
            "No customers found matching the specified groups."
        );
        assert_eq!(ExportError::InputMissing.user_friendly_message(), "No file uploaded.");
        assert_eq!(
            ExportError::encode("disk full").category(),
            ErrorCategory::Output
        );
    }
}
