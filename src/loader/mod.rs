//! Request-time session loading
//!
//! [`StoredSessionLoader`] turns the cookies on a request into a validated
//! session, refreshing it with the provider when it is old enough.
//! [`StoredSessionLoaderLayer`] runs it in front of an axum/tower service, and
//! the extractors hand the result to handlers.

mod extractors;
mod layer;
mod options;
mod scope;
mod stored;

pub use extractors::{CurrentSession, RequireSession};
pub use layer::{StoredSessionLoaderLayer, StoredSessionLoaderService};
pub use options::{RefreshRetryPolicy, StoredSessionLoaderOptions};
pub use scope::RequestScope;
pub use stored::StoredSessionLoader;
