pub mod status;

pub use status::{RequestStatusError, RequestStatusQuery, RequestStatusResponse};
