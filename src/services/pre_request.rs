use std::sync::Arc;

use futures::future::join_all;

use crate::error::AppError;
use crate::models::{
    PreRequestBucket, PreRequestConfig, PreRequestOutcome, PreRequestResults, PreRequestScope,
};
use crate::services::executor::HttpExecutor;
use crate::storage::Storage;

/// Resolution stopped on a storage failure; `partial` holds what did complete
#[derive(Debug)]
pub struct ResolveError {
    pub error: AppError,
    pub partial: PreRequestResults,
}

/// Runs the upstream requests configured for a project and collects their responses
#[derive(Clone)]
pub struct PreRequestResolver {
    storage: Arc<dyn Storage>,
    executor: HttpExecutor,
}

impl PreRequestResolver {
    pub fn new(storage: Arc<dyn Storage>, executor: HttpExecutor) -> Self {
        Self { storage, executor }
    }

    /// Run global pre-requests, plus custom ones when `request_info_id` is given.
    /// Both scopes run concurrently.
    pub async fn resolve(
        &self,
        project_id: i64,
        request_info_id: Option<i64>,
    ) -> Result<PreRequestResults, ResolveError> {
        let global = self.resolve_global(project_id);
        let custom = async {
            match request_info_id {
                Some(target) => Some(self.resolve_custom(project_id, target).await),
                None => None,
            }
        };
        let (global, custom) = futures::join!(global, custom);

        let mut results = PreRequestResults::default();
        let mut failure = None;

        match global {
            Ok(bucket) => results.set_bucket(PreRequestScope::Global, bucket),
            Err(e) => failure = Some(e),
        }
        match custom {
            Some(Ok(bucket)) => results.set_bucket(PreRequestScope::Custom, bucket),
            Some(Err(e)) => failure = failure.or(Some(e)),
            None => {}
        }

        match failure {
            Some(error) => Err(ResolveError {
                error,
                partial: results,
            }),
            None => Ok(results),
        }
    }

    /// Every global config of the project, keyed by config id
    pub async fn resolve_global(&self, project_id: i64) -> Result<PreRequestBucket, AppError> {
        let configs = self
            .storage
            .get_pre_request_configs(project_id, Some(PreRequestScope::Global), None)
            .await?;

        tracing::info!(project_id, count = configs.len(), "Running global pre-requests");
        Ok(self.run_all(&configs).await)
    }

    /// Custom configs of the project that target `request_info_id`
    pub async fn resolve_custom(
        &self,
        project_id: i64,
        request_info_id: i64,
    ) -> Result<PreRequestBucket, AppError> {
        let configs = self
            .storage
            .get_pre_request_configs(
                project_id,
                Some(PreRequestScope::Custom),
                Some(request_info_id),
            )
            .await?;

        tracing::info!(
            project_id,
            request_info_id,
            count = configs.len(),
            "Running custom pre-requests"
        );
        Ok(self.run_all(&configs).await)
    }

    async fn run_all(&self, configs: &[PreRequestConfig]) -> PreRequestBucket {
        join_all(configs.iter().map(|config| self.run_one(config)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// `None` when the config has nothing to run
    async fn run_one(&self, config: &PreRequestConfig) -> Option<(i64, PreRequestOutcome)> {
        let Some(request_info_id) = config.request_info_id else {
            tracing::debug!(config_id = config.id, "Pre-request has no request bound, skipping");
            return None;
        };

        let info = match self.storage.get_request_info(request_info_id).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                tracing::warn!(
                    config_id = config.id,
                    request_info_id,
                    "Pre-request target not found, skipping"
                );
                return None;
            }
            Err(e) => {
                tracing::error!(
                    config_id = config.id,
                    error = ?e,
                    "Failed to load pre-request target"
                );
                return Some((config.id, PreRequestOutcome::failed(e)));
            }
        };

        let query = match config.query_pairs() {
            Ok(query) => query,
            Err(e) => {
                tracing::warn!(config_id = config.id, error = %e, "Invalid pre-request query");
                return Some((config.id, PreRequestOutcome::failed(e)));
            }
        };

        let definition = info.definition;
        let url = config.target_url(&definition.url);
        let body = serde_json::Value::String(config.body_info.clone().unwrap_or_default());

        let outcome = match self
            .executor
            .execute(definition.method, &url, &definition.headers, &body, &query)
            .await
        {
            Ok(response) => {
                tracing::info!(
                    config_id = config.id,
                    status = response.status,
                    "Pre-request completed"
                );
                PreRequestOutcome {
                    header: response.headers,
                    body: response.body,
                }
            }
            Err(e) => {
                tracing::warn!(config_id = config.id, url = %url, error = %e, "Pre-request failed");
                PreRequestOutcome::failed(e)
            }
        };

        Some((config.id, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfigScope, CreatePreRequestConfig, HttpMethod, RequestDefinition};
    use crate::services::executor::ExecutorConfig;
    use crate::storage::InMemoryStorage;
    use serde_json::json;
    use wiremock::matchers::{body_string, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        storage: Arc<InMemoryStorage>,
        resolver: PreRequestResolver,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(InMemoryStorage::new());
        let executor = HttpExecutor::new(ExecutorConfig::default()).unwrap();
        let resolver = PreRequestResolver::new(storage.clone(), executor);
        Fixture { storage, resolver }
    }

    impl Fixture {
        async fn saved_request(&self, url: &str, method: HttpMethod) -> i64 {
            self.storage
                .save_request_info(None, &RequestDefinition::new(url, method))
                .await
                .unwrap()
        }

        async fn config(&self, scope: ConfigScope, request_info_id: Option<i64>) -> i64 {
            self.config_with(scope, request_info_id, None, None, None).await
        }

        async fn config_with(
            &self,
            scope: ConfigScope,
            request_info_id: Option<i64>,
            body_info: Option<&str>,
            query_info: Option<&str>,
            host: Option<&str>,
        ) -> i64 {
            self.storage
                .create_pre_request_config(&CreatePreRequestConfig {
                    project_id: 1,
                    request_info_id,
                    scope,
                    body_info: body_info.map(str::to_string),
                    query_info: query_info.map(str::to_string),
                    host: host.map(str::to_string),
                    request_name: None,
                })
                .await
                .unwrap()
                .id
        }
    }

    #[tokio::test]
    async fn test_global_success_and_failure_side_by_side() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-trace", "t1")
                    .set_body_json(json!({"token": "abc"})),
            )
            .mount(&server)
            .await;

        let f = fixture();
        let ok_request = f
            .saved_request(&format!("{}/token", server.uri()), HttpMethod::Get)
            .await;
        let bad_request = f
            .saved_request("http://127.0.0.1:1/down", HttpMethod::Get)
            .await;
        let ok = f.config(ConfigScope::Global, Some(ok_request)).await;
        let bad = f.config(ConfigScope::Global, Some(bad_request)).await;

        let results = f.resolver.resolve(1, None).await.unwrap();
        assert!(results.custom.is_none());

        let global = results.global.unwrap();
        assert_eq!(global.len(), 2);
        assert_eq!(global[&ok].body, json!({"token": "abc"}));
        assert_eq!(global[&ok].header["x-trace"], "t1");

        let failed = global[&bad].body.as_str().unwrap();
        assert!(failed.starts_with("请求失败: "));
        assert!(global[&bad].header.is_empty());
    }

    #[tokio::test]
    async fn test_configs_without_target_are_skipped() {
        let f = fixture();
        f.config(ConfigScope::Global, None).await;
        f.config(ConfigScope::Global, Some(999)).await;

        let results = f.resolver.resolve(1, None).await.unwrap();
        assert_eq!(results.global, Some(PreRequestBucket::new()));
    }

    #[tokio::test]
    async fn test_custom_runs_only_for_matching_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(query_param("tenant", "a b"))
            .and(body_string(r#"{"user":"u"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session": "s-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let f = fixture();
        let login = f.saved_request("/login", HttpMethod::Post).await;
        let matching = f
            .config_with(
                ConfigScope::Custom {
                    private_request_id: 7,
                },
                Some(login),
                Some(r#"{"user":"u"}"#),
                Some(r#"{"tenant":"a b"}"#),
                Some(&format!("{}/", server.uri())),
            )
            .await;
        f.config(
            ConfigScope::Custom {
                private_request_id: 8,
            },
            Some(login),
        )
        .await;

        let results = f.resolver.resolve(1, Some(7)).await.unwrap();
        assert_eq!(results.global, Some(PreRequestBucket::new()));

        let custom = results.custom.unwrap();
        assert_eq!(custom.len(), 1);
        assert_eq!(custom[&matching].body, json!({"session": "s-1"}));
    }

    #[tokio::test]
    async fn test_invalid_query_info_records_failure() {
        let f = fixture();
        let target = f.saved_request("http://api.test/x", HttpMethod::Get).await;
        let id = f
            .config_with(ConfigScope::Global, Some(target), None, Some("not json"), None)
            .await;

        let results = f.resolver.resolve(1, None).await.unwrap();
        let outcome = &results.global.unwrap()[&id];
        assert!(outcome.body.as_str().unwrap().starts_with("请求失败: "));
    }

    #[tokio::test]
    async fn test_no_configs_yields_empty_buckets() {
        let f = fixture();
        let results = f.resolver.resolve(1, Some(3)).await.unwrap();
        assert_eq!(
            serde_json::to_value(&results).unwrap(),
            json!({"global": {}, "custom": {}})
        );
    }
}
