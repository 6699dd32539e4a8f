use xapi::models::{ConfigScope, CreatePreRequestConfig, HttpMethod, RequestDefinition};
use xapi::services::AuthService;
use xapi::state::AppState;
use xapi::storage::Storage;

/// Authentication info for tests
#[allow(dead_code)]
pub struct TestAuth {
    pub user_id: i64,
    pub username: String,
    pub token: String,
}

impl TestAuth {
    /// Get the Authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Factory for creating test data
pub struct Factory<'a> {
    state: &'a AppState,
}

#[allow(dead_code)]
impl<'a> Factory<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Issue a token for a test user
    pub fn create_user(&self) -> TestAuth {
        let user_id = 1;
        let username = "tester".to_string();
        let token = AuthService::generate_token(user_id, &username, &self.state.config).unwrap();

        TestAuth {
            user_id,
            username,
            token,
        }
    }

    /// Save a request definition and attach it to a project
    pub async fn create_request(
        &self,
        project_id: i64,
        url: &str,
        method: HttpMethod,
        name: &str,
    ) -> i64 {
        let mut definition = RequestDefinition::new(url, method);
        definition.request_name = Some(name.to_string());

        let id = self
            .state
            .storage
            .save_request_info(None, &definition)
            .await
            .unwrap();
        self.state
            .storage
            .add_project_relation(project_id, id)
            .await
            .unwrap();
        id
    }

    /// Create a global pre-request config running `request_info_id`
    pub async fn create_global_config(&self, project_id: i64, request_info_id: i64) -> i64 {
        self.create_config(project_id, request_info_id, ConfigScope::Global)
            .await
    }

    /// Create a custom pre-request config running `request_info_id` before `target`
    pub async fn create_custom_config(
        &self,
        project_id: i64,
        request_info_id: i64,
        target: i64,
    ) -> i64 {
        self.create_config(
            project_id,
            request_info_id,
            ConfigScope::Custom {
                private_request_id: target,
            },
        )
        .await
    }

    async fn create_config(
        &self,
        project_id: i64,
        request_info_id: i64,
        scope: ConfigScope,
    ) -> i64 {
        self.state
            .storage
            .create_pre_request_config(&CreatePreRequestConfig {
                project_id,
                request_info_id: Some(request_info_id),
                scope,
                body_info: None,
                query_info: None,
                host: None,
                request_name: None,
            })
            .await
            .unwrap()
            .id
    }
}
