use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Select, Set,
};
use time::OffsetDateTime;

use crate::entity::advanced_config::{self, ActiveModel, Column, Entity as AdvancedConfigEntity};
use crate::error::{AppError, AppResult};
use crate::models::{ConfigScope, CreatePreRequestConfig, PreRequestConfig, PreRequestScope};
use crate::repositories::Repository;

/// Pre-request config repository
pub struct AdvancedConfigRepository;

#[async_trait]
impl Repository<PreRequestConfig> for AdvancedConfigRepository {
    async fn find_by_id(db: &DatabaseConnection, id: i64) -> AppResult<PreRequestConfig> {
        let model = AdvancedConfigEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Advanced config".to_string()))?;

        PreRequestConfig::try_from(model)
    }

    async fn delete(db: &DatabaseConnection, id: i64) -> AppResult<()> {
        let result = AdvancedConfigEntity::delete_by_id(id).exec(db).await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Advanced config".to_string()));
        }

        Ok(())
    }
}

impl AdvancedConfigRepository {
    pub async fn create(
        db: &DatabaseConnection,
        input: &CreatePreRequestConfig,
    ) -> AppResult<PreRequestConfig> {
        let now = OffsetDateTime::now_utc();
        let model = ActiveModel {
            project_id: Set(input.project_id),
            request_info_id: Set(input.request_info_id),
            is_global: Set(input.scope.is_global()),
            private_request_id: Set(input.scope.private_request_id()),
            body_info: Set(input.body_info.clone()),
            query_info: Set(input.query_info.clone()),
            host: Set(input.host.clone()),
            request_name: Set(input.request_name.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = model.insert(db).await?;
        PreRequestConfig::try_from(result)
    }

    pub async fn update(
        db: &DatabaseConnection,
        id: i64,
        input: &CreatePreRequestConfig,
    ) -> AppResult<PreRequestConfig> {
        let model = AdvancedConfigEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Advanced config".to_string()))?;

        let mut active: ActiveModel = model.into();
        active.project_id = Set(input.project_id);
        active.request_info_id = Set(input.request_info_id);
        active.is_global = Set(input.scope.is_global());
        active.private_request_id = Set(input.scope.private_request_id());
        active.body_info = Set(input.body_info.clone());
        active.query_info = Set(input.query_info.clone());
        active.host = Set(input.host.clone());
        active.request_name = Set(input.request_name.clone());
        active.updated_at = Set(OffsetDateTime::now_utc());

        let result = active.update(db).await?;
        PreRequestConfig::try_from(result)
    }

    /// Configs of a project, newest first. The private request filter only applies to
    /// custom lookups
    pub async fn list_by_project(
        db: &DatabaseConnection,
        project_id: i64,
        scope: Option<PreRequestScope>,
        private_request_id: Option<i64>,
    ) -> AppResult<Vec<PreRequestConfig>> {
        let models = Self::filtered(project_id, scope, private_request_id)
            .all(db)
            .await?;

        Ok(into_configs(models))
    }

    /// One page of `list_by_project` plus the total number of matching configs
    pub async fn list_page(
        db: &DatabaseConnection,
        project_id: i64,
        scope: Option<PreRequestScope>,
        private_request_id: Option<i64>,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<PreRequestConfig>, u64)> {
        let paginator = Self::filtered(project_id, scope, private_request_id).paginate(db, limit);
        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(offset / limit).await?;

        Ok((into_configs(models), total))
    }

    fn filtered(
        project_id: i64,
        scope: Option<PreRequestScope>,
        private_request_id: Option<i64>,
    ) -> Select<AdvancedConfigEntity> {
        let mut query = AdvancedConfigEntity::find().filter(Column::ProjectId.eq(project_id));

        if let Some(scope) = scope {
            query = query.filter(Column::IsGlobal.eq(scope == PreRequestScope::Global));
        }
        if let (Some(PreRequestScope::Custom), Some(target)) = (scope, private_request_id) {
            query = query.filter(Column::PrivateRequestId.eq(target));
        }

        query
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
    }
}

/// Invalid rows are logged and skipped
fn into_configs(models: Vec<advanced_config::Model>) -> Vec<PreRequestConfig> {
    models
        .into_iter()
        .filter_map(|model| {
            let id = model.id;
            PreRequestConfig::try_from(model)
                .inspect_err(|e| {
                    tracing::warn!(config_id = id, error = ?e, "Skipping invalid advanced config")
                })
                .ok()
        })
        .collect()
}

impl TryFrom<advanced_config::Model> for PreRequestConfig {
    type Error = AppError;

    fn try_from(m: advanced_config::Model) -> Result<Self, Self::Error> {
        let scope = ConfigScope::from_parts(m.is_global, m.private_request_id).ok_or_else(|| {
            AppError::Internal(format!(
                "Advanced config {} is custom but has no private request",
                m.id
            ))
        })?;

        Ok(Self {
            id: m.id,
            project_id: m.project_id,
            request_info_id: m.request_info_id,
            scope,
            body_info: m.body_info,
            query_info: m.query_info,
            host: m.host,
            request_name: m.request_name,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}
