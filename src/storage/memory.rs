use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};
use crate::models::{
    CreatePreRequestConfig, HistoryRow, NewHistoryRow, PreRequestConfig, PreRequestScope,
    RequestDefinition, RequestInfo,
};
use crate::storage::Storage;

/// In-memory storage for tests and local runs without PostgreSQL
#[derive(Clone)]
pub struct InMemoryStorage {
    inner: Arc<Mutex<InMemoryStorageInner>>,
}

#[derive(Default)]
struct InMemoryStorageInner {
    next_id: i64,
    requests: BTreeMap<i64, StoredRequest>,
    /// (project_id, request_info_id)
    relations: BTreeSet<(i64, i64)>,
    configs: BTreeMap<i64, PreRequestConfig>,
    history: Vec<HistoryRow>,
}

struct StoredRequest {
    info: RequestInfo,
    is_deleted: bool,
}

impl InMemoryStorageInner {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn live_request(&self, id: i64) -> Option<&RequestInfo> {
        self.requests
            .get(&id)
            .filter(|stored| !stored.is_deleted)
            .map(|stored| &stored.info)
    }

    /// Configs of a project, newest first
    fn matching_configs(
        &self,
        project_id: i64,
        scope: Option<PreRequestScope>,
        private_request_id: Option<i64>,
    ) -> Vec<PreRequestConfig> {
        let mut configs: Vec<PreRequestConfig> = self
            .configs
            .values()
            .filter(|config| config.project_id == project_id)
            .filter(|config| scope.is_none_or(|scope| config.scope.kind() == scope))
            .filter(|config| match (scope, private_request_id) {
                (Some(PreRequestScope::Custom), Some(target)) => {
                    config.scope.private_request_id() == Some(target)
                }
                _ => true,
            })
            .cloned()
            .collect();

        configs.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        configs
    }

    fn insert_request(&mut self, definition: RequestDefinition) -> i64 {
        let id = self.allocate_id();
        self.requests.insert(
            id,
            StoredRequest {
                info: RequestInfo {
                    id,
                    timestamp: OffsetDateTime::now_utc(),
                    definition,
                },
                is_deleted: false,
            },
        );
        id
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(InMemoryStorageInner::default())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn build_config(
    id: i64,
    input: &CreatePreRequestConfig,
    created_at: OffsetDateTime,
) -> PreRequestConfig {
    PreRequestConfig {
        id,
        project_id: input.project_id,
        request_info_id: input.request_info_id,
        scope: input.scope,
        body_info: input.body_info.clone(),
        query_info: input.query_info.clone(),
        host: input.host.clone(),
        request_name: input.request_name.clone(),
        created_at,
        updated_at: OffsetDateTime::now_utc(),
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_request_info(&self, id: i64) -> AppResult<Option<RequestInfo>> {
        let inner = self.inner.lock().await;
        Ok(inner.live_request(id).cloned())
    }

    async fn save_request_info(
        &self,
        id: Option<i64>,
        definition: &RequestDefinition,
    ) -> AppResult<i64> {
        let mut inner = self.inner.lock().await;

        match id {
            Some(id) => {
                let stored = inner
                    .requests
                    .get_mut(&id)
                    .filter(|stored| !stored.is_deleted)
                    .ok_or_else(|| AppError::NotFound("Request info".to_string()))?;
                stored.info.definition = definition.clone();
                stored.info.timestamp = OffsetDateTime::now_utc();
                Ok(id)
            }
            None => Ok(inner.insert_request(definition.clone())),
        }
    }

    async fn add_project_relation(&self, project_id: i64, request_info_id: i64) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner.relations.insert((project_id, request_info_id));
        Ok(())
    }

    async fn copy_request_info(&self, id: i64, project_id: i64) -> AppResult<Option<i64>> {
        let mut inner = self.inner.lock().await;

        let Some(original) = inner.live_request(id) else {
            return Ok(None);
        };
        let mut definition = original.definition.clone();
        definition.request_name = definition.request_name.map(|name| format!("{}_copy", name));

        let new_id = inner.insert_request(definition);
        inner.relations.insert((project_id, new_id));
        Ok(Some(new_id))
    }

    async fn delete_request_info(&self, id: i64, project_id: i64) -> AppResult<bool> {
        let mut inner = self.inner.lock().await;

        let detached = inner.relations.remove(&(project_id, id));
        let still_referenced = inner.relations.iter().any(|(_, request)| *request == id);
        if still_referenced {
            return Ok(detached);
        }

        match inner.requests.get_mut(&id) {
            Some(stored) if !stored.is_deleted => {
                stored.is_deleted = true;
                Ok(true)
            }
            _ => Ok(detached),
        }
    }

    async fn list_project_requests(&self, project_id: i64) -> AppResult<Vec<RequestInfo>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .relations
            .iter()
            .filter(|(project, _)| *project == project_id)
            .filter_map(|(_, request)| inner.live_request(*request).cloned())
            .collect())
    }

    async fn get_pre_request_configs(
        &self,
        project_id: i64,
        scope: Option<PreRequestScope>,
        private_request_id: Option<i64>,
    ) -> AppResult<Vec<PreRequestConfig>> {
        let inner = self.inner.lock().await;
        Ok(inner.matching_configs(project_id, scope, private_request_id))
    }

    async fn list_pre_request_configs(
        &self,
        project_id: i64,
        scope: Option<PreRequestScope>,
        private_request_id: Option<i64>,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<PreRequestConfig>, u64)> {
        let inner = self.inner.lock().await;
        let configs = inner.matching_configs(project_id, scope, private_request_id);
        let total = configs.len() as u64;

        let page = configs
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect();
        Ok((page, total))
    }

    async fn get_pre_request_config(&self, id: i64) -> AppResult<PreRequestConfig> {
        let inner = self.inner.lock().await;
        inner
            .configs
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Advanced config".to_string()))
    }

    async fn create_pre_request_config(
        &self,
        input: &CreatePreRequestConfig,
    ) -> AppResult<PreRequestConfig> {
        let mut inner = self.inner.lock().await;
        let id = inner.allocate_id();
        let config = build_config(id, input, OffsetDateTime::now_utc());
        inner.configs.insert(id, config.clone());
        Ok(config)
    }

    async fn update_pre_request_config(
        &self,
        id: i64,
        input: &CreatePreRequestConfig,
    ) -> AppResult<PreRequestConfig> {
        let mut inner = self.inner.lock().await;
        let existing = inner
            .configs
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Advanced config".to_string()))?;

        *existing = build_config(id, input, existing.created_at);
        Ok(existing.clone())
    }

    async fn delete_pre_request_config(&self, id: i64) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .configs
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Advanced config".to_string()))
    }

    async fn append_history(&self, row: NewHistoryRow) -> AppResult<i64> {
        let mut inner = self.inner.lock().await;
        let id = inner.allocate_id();
        inner.history.push(row.with_id(id));
        Ok(id)
    }

    async fn list_history(&self, request_info_id: i64) -> AppResult<Vec<HistoryRow>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .history
            .iter()
            .rev()
            .filter(|row| row.request_info_id == request_info_id)
            .cloned()
            .collect())
    }
}
