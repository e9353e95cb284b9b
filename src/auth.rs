/// Capability the core consumes from the session layer.
///
/// The identity provider itself is an external collaborator; only the
/// token-bearing contract matters here. Absence of a token is a hard-stop
/// precondition for every authenticated operation - the core never attempts
/// re-auth mid-upload.
pub trait AuthProvider: Send + Sync {
    /// Current bearer token, if a valid session exists
    fn token(&self) -> Option<String>;

    fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }
}

/// Fixed-token provider for tests and simple embeddings
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Provider with no session at all
    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

impl AuthProvider for StaticTokenProvider {
    fn token(&self) -> Option<String> {
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_provider() {
        let provider = StaticTokenProvider::new("abc");
        assert!(provider.is_authenticated());
        assert_eq!(provider.token(), Some("abc".to_string()));

        let anon = StaticTokenProvider::anonymous();
        assert!(!anon.is_authenticated());
    }
}
