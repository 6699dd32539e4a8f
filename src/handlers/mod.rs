pub mod advanced_config;
pub mod common;
pub mod history;
pub mod request_info;
pub mod send;

pub use advanced_config::{
    create_advanced_config, delete_advanced_config, get_advanced_config, list_advanced_configs,
    update_advanced_config, AdvancedConfigListResponse, AdvancedConfigResponse,
    SaveAdvancedConfigRequest,
};
pub use common::{MessageResponse, PaginationParams};
pub use history::{get_request_history, HistoryEntryResponse};
pub use request_info::{
    copy_request_info, delete_request_info, list_project_requests, save_request_info,
    CopyRequestInfoResponse, ProjectRequestAction, RequestInfoListResponse, RequestInfoResponse,
    SaveRequestInfoRequest, SaveRequestInfoResponse,
};
pub use send::{send_request, SendRequestBody};
