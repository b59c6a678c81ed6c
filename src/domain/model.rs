use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const CUSTOMER_GROUP: &str = "Customer Group";
pub const CUSTOMER_ID: &str = "Customer ID";
pub const CUSTOMER_NAME: &str = "Customer Name";
pub const DATE_JOINED: &str = "Date Joined";
pub const EXPIRATION_DATE: &str = "Expiration Date";

/// 查無到期日時填入的值
pub const NOT_AVAILABLE: &str = "N/A";

/// 一筆資料列：欄位名稱到字串值，保留標頭順序
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub data: IndexMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }

    /// 移除欄位但不打亂其餘欄位的順序
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.data.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// 一次執行的最終產出
#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub file_name: String,
    pub body: Vec<u8>,
    pub records: usize,
    pub enriched: usize,
}
