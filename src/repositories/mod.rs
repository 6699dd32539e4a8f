pub mod advanced_config;
pub mod history;
pub mod request_info;

pub use advanced_config::AdvancedConfigRepository;
pub use history::HistoryRepository;
pub use request_info::RequestInfoRepository;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::error::AppResult;

/// Base repository trait for lookups and removal by primary key
#[async_trait]
pub trait Repository<T>
where
    T: Send + Sync,
{
    /// Find entity by ID
    async fn find_by_id(db: &DatabaseConnection, id: i64) -> AppResult<T>;

    /// Delete entity by ID
    async fn delete(db: &DatabaseConnection, id: i64) -> AppResult<()>;
}
