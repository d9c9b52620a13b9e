use crate::session::SessionState;

/// Per-request state shared by the handlers in a chain
///
/// Lives in the request extensions. A handler running before the loader may
/// install a session here, and the loader will leave it alone.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    pub session: Option<SessionState>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: SessionState) -> Self {
        Self {
            session: Some(session),
        }
    }
}
