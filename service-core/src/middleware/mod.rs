pub mod actor;
pub mod tracing;

pub use actor::Actor;
pub use tracing::{REQUEST_ID_HEADER, request_id_middleware};
