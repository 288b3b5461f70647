pub const ANONYMOUS_USER: &str = "anonymous";

/// Who the client is acting as. A bearer token implies a signed-in user id;
/// without one every date-scoped call goes through the anonymous fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub token: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self {
            user_id: ANONYMOUS_USER.to_string(),
            token: None,
        }
    }

    pub fn authenticated(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: Some(token.into()),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.token.is_none()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}
