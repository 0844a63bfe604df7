//! Client-side core of the fingerprint and connection-settings panels.
//!
//! Two remote services are consumed over D-Bus: the system fingerprint
//! daemon (claim/enroll/list/delete plus push signals) and per-connection
//! settings session objects (JSON-scalar key/value store). The enrollment
//! state machine lives in [`enroll`], the settings cache in [`mirror`];
//! both are driven through trait seams so they can run against mocks.

pub mod confd;
pub mod enroll;
pub mod error;
pub mod fingerd;
pub mod mirror;
pub mod util;

pub use error::ServiceError;
