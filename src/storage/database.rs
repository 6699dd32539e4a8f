use async_trait::async_trait;
use sea_orm::{DatabaseConnection, TransactionTrait};

use crate::error::AppResult;
use crate::models::{
    CreatePreRequestConfig, HistoryRow, NewHistoryRow, PreRequestConfig, PreRequestScope,
    RequestDefinition, RequestInfo,
};
use crate::repositories::{
    AdvancedConfigRepository, HistoryRepository, Repository, RequestInfoRepository,
};
use crate::storage::Storage;

/// PostgreSQL storage backed by the SeaORM repositories
pub struct DatabaseStorage {
    db: DatabaseConnection,
}

impl DatabaseStorage {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Storage for DatabaseStorage {
    async fn get_request_info(&self, id: i64) -> AppResult<Option<RequestInfo>> {
        RequestInfoRepository::find_live(&self.db, id).await
    }

    async fn save_request_info(
        &self,
        id: Option<i64>,
        definition: &RequestDefinition,
    ) -> AppResult<i64> {
        match id {
            Some(id) => {
                RequestInfoRepository::update(&self.db, id, definition).await?;
                tracing::info!(request_info_id = id, "Request info updated");
                Ok(id)
            }
            None => {
                let id = RequestInfoRepository::create(&self.db, definition).await?;
                tracing::info!(request_info_id = id, "Request info created");
                Ok(id)
            }
        }
    }

    async fn add_project_relation(&self, project_id: i64, request_info_id: i64) -> AppResult<()> {
        RequestInfoRepository::add_relation(&self.db, project_id, request_info_id).await
    }

    async fn copy_request_info(&self, id: i64, project_id: i64) -> AppResult<Option<i64>> {
        let Some(original) = RequestInfoRepository::find_live(&self.db, id).await? else {
            return Ok(None);
        };

        let mut definition = original.definition;
        definition.request_name = definition.request_name.map(|name| format!("{}_copy", name));

        let txn = self.db.begin().await?;
        let new_id = RequestInfoRepository::create(&txn, &definition).await?;
        RequestInfoRepository::add_relation(&txn, project_id, new_id).await?;
        txn.commit().await?;
        tracing::info!(request_info_id = id, new_id, project_id, "Request info copied");

        Ok(Some(new_id))
    }

    async fn delete_request_info(&self, id: i64, project_id: i64) -> AppResult<bool> {
        let txn = self.db.begin().await?;

        let detached = RequestInfoRepository::remove_relation(&txn, project_id, id).await?;
        let remaining = RequestInfoRepository::count_relations(&txn, id).await?;
        let deleted = if remaining == 0 {
            RequestInfoRepository::soft_delete(&txn, id).await?
        } else {
            false
        };

        txn.commit().await?;
        tracing::info!(
            request_info_id = id,
            project_id,
            remaining,
            deleted,
            "Request info removed from project"
        );

        Ok(detached || deleted)
    }

    async fn list_project_requests(&self, project_id: i64) -> AppResult<Vec<RequestInfo>> {
        RequestInfoRepository::list_by_project(&self.db, project_id).await
    }

    async fn get_pre_request_configs(
        &self,
        project_id: i64,
        scope: Option<PreRequestScope>,
        private_request_id: Option<i64>,
    ) -> AppResult<Vec<PreRequestConfig>> {
        AdvancedConfigRepository::list_by_project(&self.db, project_id, scope, private_request_id)
            .await
    }

    async fn list_pre_request_configs(
        &self,
        project_id: i64,
        scope: Option<PreRequestScope>,
        private_request_id: Option<i64>,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<PreRequestConfig>, u64)> {
        AdvancedConfigRepository::list_page(
            &self.db,
            project_id,
            scope,
            private_request_id,
            limit,
            offset,
        )
        .await
    }

    async fn get_pre_request_config(&self, id: i64) -> AppResult<PreRequestConfig> {
        AdvancedConfigRepository::find_by_id(&self.db, id).await
    }

    async fn create_pre_request_config(
        &self,
        input: &CreatePreRequestConfig,
    ) -> AppResult<PreRequestConfig> {
        let config = AdvancedConfigRepository::create(&self.db, input).await?;
        tracing::info!(
            config_id = config.id,
            project_id = config.project_id,
            "Advanced config created"
        );
        Ok(config)
    }

    async fn update_pre_request_config(
        &self,
        id: i64,
        input: &CreatePreRequestConfig,
    ) -> AppResult<PreRequestConfig> {
        AdvancedConfigRepository::update(&self.db, id, input).await
    }

    async fn delete_pre_request_config(&self, id: i64) -> AppResult<()> {
        AdvancedConfigRepository::delete(&self.db, id).await
    }

    async fn append_history(&self, row: NewHistoryRow) -> AppResult<i64> {
        HistoryRepository::append(&self.db, row).await
    }

    async fn list_history(&self, request_info_id: i64) -> AppResult<Vec<HistoryRow>> {
        HistoryRepository::list_by_request(&self.db, request_info_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Transaction, Value};
    use time::OffsetDateTime;

    use super::*;
    use crate::entity::{project_request_relation, request_info};

    fn affected(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn count(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
    }

    fn stored(id: i64, name: &str) -> request_info::Model {
        request_info::Model {
            id,
            timestamp: OffsetDateTime::UNIX_EPOCH,
            url: "http://api.test/login".to_string(),
            method: "POST".to_string(),
            headers: None,
            body: Some(r#"{"user":"u"}"#.to_string()),
            query: None,
            auth: None,
            request_name: Some(name.to_string()),
            is_deleted: false,
        }
    }

    fn statements(transaction: &Transaction) -> Vec<String> {
        transaction
            .statements()
            .iter()
            .map(|statement| statement.sql.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_delete_last_reference_soft_deletes_in_one_transaction() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([affected(1), affected(1)])
            .append_query_results([vec![count(0)]])
            .into_connection();
        let storage = DatabaseStorage::new(db);

        assert!(storage.delete_request_info(4, 1).await.unwrap());

        let log = storage.db.into_transaction_log();
        assert_eq!(log.len(), 1);
        let sql = statements(&log[0]);
        assert_eq!(sql.first().map(String::as_str), Some("BEGIN"));
        assert_eq!(sql.last().map(String::as_str), Some("COMMIT"));
        assert!(sql[1].starts_with(r#"DELETE FROM "project_request_relation""#));
        assert!(sql[2].contains("COUNT(*)"));
        assert!(sql[3].starts_with(r#"UPDATE "request_info""#));
    }

    #[tokio::test]
    async fn test_delete_keeps_definition_still_referenced() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([affected(1)])
            .append_query_results([vec![count(1)]])
            .into_connection();
        let storage = DatabaseStorage::new(db);

        assert!(storage.delete_request_info(4, 1).await.unwrap());

        let log = storage.db.into_transaction_log();
        let sql = statements(&log[0]);
        assert!(!sql.iter().any(|statement| statement.starts_with("UPDATE")));
        assert_eq!(sql.last().map(String::as_str), Some("COMMIT"));
    }

    #[tokio::test]
    async fn test_delete_unlinked_definition_reports_nothing_removed() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([affected(0), affected(0)])
            .append_query_results([vec![count(0)]])
            .into_connection();
        let storage = DatabaseStorage::new(db);

        assert!(!storage.delete_request_info(4, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_copy_inserts_definition_and_link_together() {
        let relation = project_request_relation::Model {
            id: 1,
            project_id: 2,
            request_info_id: 5,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored(4, "login")], vec![stored(5, "login_copy")]])
            .append_query_results([vec![], vec![relation]])
            .into_connection();
        let storage = DatabaseStorage::new(db);

        assert_eq!(storage.copy_request_info(4, 2).await.unwrap(), Some(5));

        let log = storage.db.into_transaction_log();
        assert_eq!(log.len(), 2);
        let sql = statements(&log[1]);
        assert_eq!(sql.first().map(String::as_str), Some("BEGIN"));
        assert!(sql[1].starts_with(r#"INSERT INTO "request_info""#));
        assert!(sql
            .iter()
            .any(|statement| statement.starts_with(r#"INSERT INTO "project_request_relation""#)));
        assert_eq!(sql.last().map(String::as_str), Some("COMMIT"));

        let inserted = &log[1].statements()[1];
        assert!(inserted
            .values
            .as_ref()
            .unwrap()
            .0
            .contains(&Value::String(Some(Box::new("login_copy".to_string())))));
    }

    #[tokio::test]
    async fn test_copy_of_missing_definition_writes_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<request_info::Model>::new()])
            .into_connection();
        let storage = DatabaseStorage::new(db);

        assert_eq!(storage.copy_request_info(4, 2).await.unwrap(), None);
        assert_eq!(storage.db.into_transaction_log().len(), 1);
    }
}
