pub mod auth;
pub mod executor;
pub mod history;
pub mod interpolator;
pub mod orchestrator;
pub mod pre_request;

pub use auth::{AuthService, Claims};
pub use executor::{ExecutionError, ExecutorConfig, HttpExecutor};
pub use history::HistoryRecorder;
pub use orchestrator::{
    ExecutionResult, SendFailure, SendOutcome, SendPhase, SendRequest, SendService, StreamedSend,
};
pub use pre_request::{PreRequestResolver, ResolveError};
