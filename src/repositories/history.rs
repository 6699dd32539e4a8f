use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entity::request_history::{self, ActiveModel, Column, Entity as HistoryEntity};
use crate::error::AppResult;
use crate::models::{HistoryRow, NewHistoryRow};

/// Append-only execution history
pub struct HistoryRepository;

impl HistoryRepository {
    pub async fn append(db: &DatabaseConnection, row: NewHistoryRow) -> AppResult<i64> {
        let model = ActiveModel {
            request_info_id: Set(row.request_info_id),
            timestamp: Set(row.timestamp),
            url: Set(row.url),
            method: Set(row.method),
            auth: Set(row.auth),
            request_name: Set(row.request_name),
            request_headers: Set(row.request_headers),
            request_body: Set(row.request_body),
            query: Set(row.query),
            response_status: Set(row.response_status),
            response_headers: Set(row.response_headers),
            response_body: Set(row.response_body),
            response_time: Set(row.response_time),
            execution_status: Set(row.execution_status),
            execution_message: Set(row.execution_message),
            execution_details: Set(row.execution_details),
            pre_request_results: Set(row.pre_request_results),
            username: Set(row.username),
            ..Default::default()
        };

        let result = model.insert(db).await?;
        Ok(result.id)
    }

    /// Newest first
    pub async fn list_by_request(
        db: &DatabaseConnection,
        request_info_id: i64,
    ) -> AppResult<Vec<HistoryRow>> {
        let models = HistoryEntity::find()
            .filter(Column::RequestInfoId.eq(request_info_id))
            .order_by_desc(Column::Timestamp)
            .order_by_desc(Column::Id)
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }
}

impl From<request_history::Model> for HistoryRow {
    fn from(m: request_history::Model) -> Self {
        Self {
            id: m.id,
            request_info_id: m.request_info_id,
            timestamp: m.timestamp,
            url: m.url,
            method: m.method,
            auth: m.auth,
            request_name: m.request_name,
            request_headers: m.request_headers,
            request_body: m.request_body,
            query: m.query,
            response_status: m.response_status,
            response_headers: m.response_headers,
            response_body: m.response_body,
            response_time: m.response_time,
            execution_status: m.execution_status,
            execution_message: m.execution_message,
            execution_details: m.execution_details,
            pre_request_results: m.pre_request_results,
            username: m.username,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use time::OffsetDateTime;

    fn model(id: i64, response_status: i32) -> request_history::Model {
        request_history::Model {
            id,
            request_info_id: 4,
            timestamp: OffsetDateTime::UNIX_EPOCH,
            url: "http://api.test/users".to_string(),
            method: "GET".to_string(),
            auth: None,
            request_name: Some("users".to_string()),
            request_headers: Some("{}".to_string()),
            request_body: None,
            query: None,
            response_status,
            response_headers: Some("{}".to_string()),
            response_body: Some(r#"{"ok":true}"#.to_string()),
            response_time: 12,
            execution_status: "成功".to_string(),
            execution_message: Some("HTTP 200 - OK".to_string()),
            execution_details: None,
            pre_request_results: None,
            username: Some("tester".to_string()),
        }
    }

    #[tokio::test]
    async fn test_list_by_request_orders_newest_first() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![model(2, 404), model(1, 200)]])
            .into_connection();

        let rows = HistoryRepository::list_by_request(&db, 4).await.unwrap();
        assert_eq!(rows.iter().map(|row| row.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(rows[0].response_status, 404);
        assert_eq!(rows[1].username.as_deref(), Some("tester"));

        let log = db.into_transaction_log();
        let statement = &log[0].statements()[0];
        assert!(statement
            .sql
            .contains(r#""request_history"."request_info_id" = $1"#));
        assert!(statement.sql.ends_with(
            r#"ORDER BY "request_history"."timestamp" DESC, "request_history"."id" DESC"#
        ));
        assert_eq!(statement.values.as_ref().unwrap().0[0], Value::BigInt(Some(4)));
    }

    #[tokio::test]
    async fn test_append_returns_new_id() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![model(7, 200)]])
            .into_connection();

        let row = NewHistoryRow {
            request_info_id: 4,
            timestamp: OffsetDateTime::UNIX_EPOCH,
            url: "http://api.test/users".to_string(),
            method: "GET".to_string(),
            auth: None,
            request_name: None,
            request_headers: None,
            request_body: None,
            query: None,
            response_status: 200,
            response_headers: None,
            response_body: None,
            response_time: 12,
            execution_status: "成功".to_string(),
            execution_message: None,
            execution_details: None,
            pre_request_results: None,
            username: None,
        };
        let id = HistoryRepository::append(&db, row).await.unwrap();
        assert_eq!(id, 7);

        let log = db.into_transaction_log();
        assert!(log[0].statements()[0]
            .sql
            .starts_with(r#"INSERT INTO "request_history""#));
    }
}
