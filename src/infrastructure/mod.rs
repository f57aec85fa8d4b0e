pub mod http;
pub mod task_manager;

pub use http::{SnapshotApi, http_to_ws_endpoint, ws_to_http_endpoint};
pub use task_manager::TaskManager;
