pub mod deny;
pub mod grant;
pub mod request;

pub use deny::{DenyAccessCommand, DenyAccessError, DenyOutcome};
pub use grant::{GrantAccessCommand, GrantAccessError, GrantOutcome};
pub use request::{RequestAccessCommand, RequestAccessError, RequestOutcome};
