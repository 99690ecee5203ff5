//! HTTP+JSON API over the store.

mod errors;
mod handlers;
mod response;
mod server;

pub use errors::{ApiError, ApiResult, ErrorBody};
pub use handlers::ApiState;
pub use response::{HealthResponse, ListResponse, RecordResponse};
pub use server::ApiServer;
