//! Access-request lifecycle
//!
//! Per (preview, user): absent, then pending, then granted or denied. Later
//! writes overwrite the entry in place.

pub mod commands;
pub mod policy;
pub mod queries;
pub mod resolve;
pub mod routes;
pub mod saga;

pub use commands::{
    DenyAccessCommand, DenyAccessError, DenyOutcome, GrantAccessCommand, GrantAccessError,
    GrantOutcome, RequestAccessCommand, RequestAccessError, RequestOutcome,
};
pub use policy::{RerequestPolicy, SelfRequestPolicy};
pub use queries::{RequestStatusError, RequestStatusQuery, RequestStatusResponse};
pub use routes::access_request_routes;
pub use saga::{GrantPlan, GrantStep, PartialCompletion};
