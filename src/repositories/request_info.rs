use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use time::OffsetDateTime;

use crate::entity::project_request_relation::{
    self, ActiveModel as RelationActiveModel, Entity as RelationEntity,
};
use crate::entity::request_info::{self, ActiveModel, Column, Entity as RequestInfoEntity};
use crate::error::{AppError, AppResult};
use crate::models::{parse_string_map, RequestDefinition, RequestInfo};

/// Request definition repository. Deleted rows are kept and hidden from every query
pub struct RequestInfoRepository;

impl RequestInfoRepository {
    pub async fn find_live<C: ConnectionTrait>(db: &C, id: i64) -> AppResult<Option<RequestInfo>> {
        RequestInfoEntity::find_by_id(id)
            .filter(Column::IsDeleted.eq(false))
            .one(db)
            .await?
            .map(RequestInfo::try_from)
            .transpose()
    }

    /// Mark a live definition deleted. Returns false when it was already gone
    pub async fn soft_delete<C: ConnectionTrait>(db: &C, id: i64) -> AppResult<bool> {
        let result = RequestInfoEntity::update_many()
            .col_expr(Column::IsDeleted, Expr::value(true))
            .filter(Column::Id.eq(id))
            .filter(Column::IsDeleted.eq(false))
            .exec(db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        definition: &RequestDefinition,
    ) -> AppResult<i64> {
        let columns = DefinitionColumns::encode(definition)?;
        let model = ActiveModel {
            timestamp: Set(OffsetDateTime::now_utc()),
            url: Set(definition.url.clone()),
            method: Set(definition.method.to_string()),
            headers: Set(columns.headers),
            body: Set(columns.body),
            query: Set(columns.query),
            auth: Set(columns.auth),
            request_name: Set(definition.request_name.clone()),
            is_deleted: Set(false),
            ..Default::default()
        };

        let result = model.insert(db).await?;
        Ok(result.id)
    }

    pub async fn update(
        db: &DatabaseConnection,
        id: i64,
        definition: &RequestDefinition,
    ) -> AppResult<()> {
        let model = RequestInfoEntity::find_by_id(id)
            .filter(Column::IsDeleted.eq(false))
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Request info".to_string()))?;

        let columns = DefinitionColumns::encode(definition)?;
        let mut active: ActiveModel = model.into();
        active.timestamp = Set(OffsetDateTime::now_utc());
        active.url = Set(definition.url.clone());
        active.method = Set(definition.method.to_string());
        active.headers = Set(columns.headers);
        active.body = Set(columns.body);
        active.query = Set(columns.query);
        active.auth = Set(columns.auth);
        active.request_name = Set(definition.request_name.clone());

        active.update(db).await?;
        Ok(())
    }

    /// Live definitions linked to a project, oldest first
    pub async fn list_by_project(
        db: &DatabaseConnection,
        project_id: i64,
    ) -> AppResult<Vec<RequestInfo>> {
        let models = RequestInfoEntity::find()
            .join(
                JoinType::InnerJoin,
                request_info::Relation::ProjectRequestRelations.def(),
            )
            .filter(project_request_relation::Column::ProjectId.eq(project_id))
            .filter(Column::IsDeleted.eq(false))
            .order_by_asc(Column::Id)
            .all(db)
            .await?;

        models.into_iter().map(RequestInfo::try_from).collect()
    }

    /// Link a definition to a project unless already linked
    pub async fn add_relation<C: ConnectionTrait>(
        db: &C,
        project_id: i64,
        request_info_id: i64,
    ) -> AppResult<()> {
        let existing = RelationEntity::find()
            .filter(project_request_relation::Column::ProjectId.eq(project_id))
            .filter(project_request_relation::Column::RequestInfoId.eq(request_info_id))
            .one(db)
            .await?;

        if existing.is_none() {
            let relation = RelationActiveModel {
                project_id: Set(project_id),
                request_info_id: Set(request_info_id),
                created_at: Set(OffsetDateTime::now_utc()),
                ..Default::default()
            };
            relation.insert(db).await?;
        }

        Ok(())
    }

    /// Returns whether a link was removed
    pub async fn remove_relation<C: ConnectionTrait>(
        db: &C,
        project_id: i64,
        request_info_id: i64,
    ) -> AppResult<bool> {
        let result = RelationEntity::delete_many()
            .filter(project_request_relation::Column::ProjectId.eq(project_id))
            .filter(project_request_relation::Column::RequestInfoId.eq(request_info_id))
            .exec(db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Number of projects still referencing a definition
    pub async fn count_relations<C: ConnectionTrait>(
        db: &C,
        request_info_id: i64,
    ) -> AppResult<u64> {
        let count = RelationEntity::find()
            .filter(project_request_relation::Column::RequestInfoId.eq(request_info_id))
            .count(db)
            .await?;

        Ok(count)
    }
}

/// JSON text columns of a definition; empty maps are stored as NULL
struct DefinitionColumns {
    headers: Option<String>,
    body: Option<String>,
    query: Option<String>,
    auth: Option<String>,
}

impl DefinitionColumns {
    fn encode(definition: &RequestDefinition) -> AppResult<Self> {
        Ok(Self {
            headers: non_empty_json(&definition.headers, definition.headers.is_empty())?,
            body: Some(serde_json::to_string(&definition.body)?),
            query: non_empty_json(&definition.query, definition.query.is_empty())?,
            auth: non_empty_json(&definition.auth, definition.auth.is_empty())?,
        })
    }
}

fn non_empty_json<T: serde::Serialize>(value: &T, empty: bool) -> AppResult<Option<String>> {
    if empty {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(value)?))
}

/// Stored body text is JSON; rows written by other tools may hold raw text
fn decode_body(raw: Option<String>) -> serde_json::Value {
    match raw {
        None => serde_json::Value::String(String::new()),
        Some(text) => serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)),
    }
}

// Conversion from SeaORM model to our domain model
impl TryFrom<request_info::Model> for RequestInfo {
    type Error = AppError;

    fn try_from(m: request_info::Model) -> Result<Self, Self::Error> {
        let method = m.method.parse().map_err(AppError::Internal)?;
        let auth = match m.auth.as_deref() {
            None | Some("") => serde_json::Map::new(),
            Some(text) => serde_json::from_str::<Option<_>>(text)?.unwrap_or_default(),
        };

        Ok(Self {
            id: m.id,
            timestamp: m.timestamp,
            definition: RequestDefinition {
                url: m.url,
                method,
                headers: parse_string_map(m.headers.as_deref())?,
                body: decode_body(m.body),
                query: parse_string_map(m.query.as_deref())?,
                auth,
                request_name: m.request_name,
            },
        })
    }
}
