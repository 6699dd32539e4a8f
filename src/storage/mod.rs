pub mod database;
pub mod memory;

pub use database::DatabaseStorage;
pub use memory::InMemoryStorage;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{
    CreatePreRequestConfig, HistoryRow, NewHistoryRow, PreRequestConfig, PreRequestScope,
    RequestDefinition, RequestInfo,
};

/// Storage backend for request definitions, pre-request configs and history.
/// Deleted definitions are invisible to every read.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Get a live request definition
    async fn get_request_info(&self, id: i64) -> AppResult<Option<RequestInfo>>;

    /// Insert a definition, or overwrite it when `id` is given. Returns its id
    async fn save_request_info(&self, id: Option<i64>, definition: &RequestDefinition)
        -> AppResult<i64>;

    /// Associate a definition with a project (idempotent)
    async fn add_project_relation(&self, project_id: i64, request_info_id: i64) -> AppResult<()>;

    /// Copy a definition into `project_id`, returning the new id
    async fn copy_request_info(&self, id: i64, project_id: i64) -> AppResult<Option<i64>>;

    /// Detach a definition from a project, soft-deleting it once no project references it
    async fn delete_request_info(&self, id: i64, project_id: i64) -> AppResult<bool>;

    /// Live definitions of a project, oldest first
    async fn list_project_requests(&self, project_id: i64) -> AppResult<Vec<RequestInfo>>;

    /// Pre-request configs of a project, newest first. With `Custom` scope and a
    /// `private_request_id`, only configs for that request are returned
    async fn get_pre_request_configs(
        &self,
        project_id: i64,
        scope: Option<PreRequestScope>,
        private_request_id: Option<i64>,
    ) -> AppResult<Vec<PreRequestConfig>>;

    /// One page of `get_pre_request_configs` and the total number of matches
    async fn list_pre_request_configs(
        &self,
        project_id: i64,
        scope: Option<PreRequestScope>,
        private_request_id: Option<i64>,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<PreRequestConfig>, u64)>;

    /// Fails with NotFound for unknown ids
    async fn get_pre_request_config(&self, id: i64) -> AppResult<PreRequestConfig>;

    async fn create_pre_request_config(
        &self,
        input: &CreatePreRequestConfig,
    ) -> AppResult<PreRequestConfig>;

    /// Fails with NotFound for unknown ids
    async fn update_pre_request_config(
        &self,
        id: i64,
        input: &CreatePreRequestConfig,
    ) -> AppResult<PreRequestConfig>;

    /// Fails with NotFound for unknown ids
    async fn delete_pre_request_config(&self, id: i64) -> AppResult<()>;

    /// Append one execution record, returning its id
    async fn append_history(&self, row: NewHistoryRow) -> AppResult<i64>;

    /// History of a definition, newest first
    async fn list_history(&self, request_info_id: i64) -> AppResult<Vec<HistoryRow>>;
}
