//! Bearer credential handling.
//!
//! The platform authenticates one-off endpoints with the token carried in
//! the password half of HTTP basic auth, the user half left empty. The
//! credential is always passed explicitly; nothing in this crate reads it
//! from ambient state.

/// A platform bearer token.
///
/// Cloning is cheap and expected: the tunnel, the uploader and the resize
/// relay each hold their own copy for the session's lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    /// Wrap a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The raw token, for use as the basic-auth password slot.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Apply this credential to a request builder.
    ///
    /// Uses the empty-user/token-password convention the one-off
    /// endpoints expect.
    #[must_use]
    pub fn apply(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.basic_auth("", Some(&self.token))
    }
}

// The token never appears in logs or debug output.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential").field("token", &"***").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips() {
        let cred = Credential::new("tk-secret");
        assert_eq!(cred.token(), "tk-secret");
    }

    #[test]
    fn debug_redacts_token() {
        let cred = Credential::new("tk-secret");
        let rendered = format!("{cred:?}");
        assert!(!rendered.contains("tk-secret"));
        assert!(rendered.contains("***"));
    }
}
