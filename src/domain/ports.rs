use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 外部客戶屬性查詢；失敗一律回傳 `None`，不會讓執行中止
#[async_trait]
pub trait AttributeLookup: Send + Sync {
    async fn lookup(&self, customer_id: &str) -> Option<String>;
}
