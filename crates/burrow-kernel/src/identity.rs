//! Request-scoped identity.

/// Who is making a request.
///
/// Created once per request by the authentication gate and threaded through
/// every filesystem call. An anonymous identity is rooted at the base
/// directory and never picks up a user's subdirectory, whatever name it
/// carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    username: String,
    authenticated: bool,
}

impl Identity {
    /// Identity for requests that passed the authentication bypass.
    pub fn anonymous() -> Self {
        Self {
            username: String::new(),
            authenticated: false,
        }
    }

    /// Identity for a user whose credentials checked out.
    pub fn authenticated(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            authenticated: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// The username, only if it was authenticated.
    pub fn user(&self) -> Option<&str> {
        self.authenticated.then_some(self.username.as_str())
    }

    /// Name for log and audit fields; empty when anonymous.
    pub fn display_name(&self) -> &str {
        self.user().unwrap_or("")
    }
}
