//! Request authentication.

use reqwest::Method;
use std::path::PathBuf;

/// The identity a request is made as.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    /// Private key for signing, when the signer needs one.
    pub key_path: Option<PathBuf>,
    /// Shared secret for signing (cloud secret access key).
    pub secret: Option<String>,
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("name", &self.name)
            .field("key_path", &self.key_path)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: None,
            secret: None,
        }
    }

    pub fn with_key(name: impl Into<String>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: Some(key_path.into()),
            ..Self::new(name)
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

/// Produces authentication headers for a request.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, principal: &Principal, method: &Method, path: &str) -> Vec<(String, String)>;
}

/// Attaches the acting identity only, for servers behind an authenticating
/// proxy. Cryptographic request signing needs a dedicated signer.
#[derive(Clone, Debug)]
pub struct HeaderSigner {
    header: String,
}

impl Default for HeaderSigner {
    fn default() -> Self {
        Self {
            header: "X-Ops-UserId".to_string(),
        }
    }
}

impl HeaderSigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }
}

impl RequestSigner for HeaderSigner {
    fn sign(&self, principal: &Principal, _method: &Method, _path: &str) -> Vec<(String, String)> {
        vec![(self.header.clone(), principal.name.clone())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_signer() {
        let headers = HeaderSigner::new().sign(&Principal::new("admin"), &Method::GET, "/nodes");
        assert_eq!(headers, vec![("X-Ops-UserId".to_string(), "admin".to_string())]);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let principal = Principal::new("AKIA123").with_secret("wJalrXUtnFEMI");
        let shown = format!("{:?}", principal);
        assert!(shown.contains("AKIA123"));
        assert!(!shown.contains("wJalrXUtnFEMI"));
    }
}
