pub mod advanced_config;
pub mod project_request_relation;
pub mod request_history;
pub mod request_info;
