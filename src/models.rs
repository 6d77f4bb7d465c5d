use serde::{Deserialize, Serialize};

// JWT payload as minted by the user service; `sub` is accepted when a token
// carries only registered claims
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: String,
    pub exp: u64,
}

impl Claims {
    pub fn for_user(user_id: &str, email: &str, exp: u64) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            email: email.to_string(),
            exp,
            ..Self::default()
        }
    }

    /// Identity of the caller, `None` when the token names no subject.
    pub fn into_identity(self) -> Option<Identity> {
        let user_id = self.user_id.or(self.sub)?;
        Some(Identity {
            user_id,
            email: self.email,
        })
    }
}

/// Caller identity taken from a validated token. Lives in the request
/// extensions for one request and is never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}
