pub mod history;
pub mod pre_request;
pub mod request;

pub use history::*;
pub use pre_request::*;
pub use request::*;
