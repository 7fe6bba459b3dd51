//! Remote endpoint for the bootstrap session.

use crate::constants::ssh;
use std::path::PathBuf;

/// Where and how to open a remote-execution session.
///
/// Everything except `host` is passed through to the remote shell untouched.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub port: Option<u16>,
    pub identity_file: Option<PathBuf>,
    /// Jump host, `user@host[:port]`.
    pub gateway: Option<String>,
    pub host_key_verify: bool,
}

impl SshTarget {
    /// Target with default user and host-key verification enabled.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: ssh::DEFAULT_USER.to_string(),
            port: None,
            identity_file: None,
            gateway: None,
            host_key_verify: true,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn is_root(&self) -> bool {
        self.user == ssh::ROOT_USER
    }

    /// Get the URI representation of this target.
    pub fn to_uri(&self) -> String {
        format!(
            "ssh://{}@{}:{}",
            self.user,
            self.host,
            self.port.unwrap_or(ssh::DEFAULT_PORT)
        )
    }

    /// Parse `ssh://user@host[:port]` (user and port optional).
    pub fn from_uri(uri: &str) -> Result<Self, String> {
        let rest = uri
            .strip_prefix("ssh://")
            .ok_or_else(|| format!("invalid ssh URI '{}': expected ssh://", uri))?;

        let (user, host_port) = match rest.split_once('@') {
            Some((user, hp)) if !user.is_empty() => (user.to_string(), hp),
            Some(_) => return Err(format!("invalid ssh URI '{}': empty user", uri)),
            None => (ssh::DEFAULT_USER.to_string(), rest),
        };

        let (host, port) = match host_port.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|e| format!("invalid ssh port in '{}': {}", uri, e))?;
                (host, Some(port))
            }
            None => (host_port, None),
        };

        if host.is_empty() {
            return Err(format!("invalid ssh URI '{}': missing host", uri));
        }

        Ok(Self {
            host: host.to_string(),
            user,
            port,
            identity_file: None,
            gateway: None,
            host_key_verify: true,
        })
    }
}

impl std::fmt::Display for SshTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

impl std::str::FromStr for SshTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uri(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_defaults() {
        let target = SshTarget::new("10.0.0.5");
        assert_eq!(target.to_uri(), "ssh://root@10.0.0.5:22");
        assert!(target.is_root());
    }

    #[test]
    fn test_from_uri() {
        let target: SshTarget = "ssh://ubuntu@10.0.0.5:2222".parse().unwrap();
        assert_eq!(target.user, "ubuntu");
        assert_eq!(target.host, "10.0.0.5");
        assert_eq!(target.port, Some(2222));

        let bare = SshTarget::from_uri("ssh://db1.internal").unwrap();
        assert_eq!(bare.user, "root");
        assert_eq!(bare.port, None);
    }

    #[test]
    fn test_from_uri_rejects_garbage() {
        assert!(SshTarget::from_uri("tcp://host").is_err());
        assert!(SshTarget::from_uri("ssh://@host").is_err());
        assert!(SshTarget::from_uri("ssh://user@host:notaport").is_err());
        assert!(SshTarget::from_uri("ssh://user@").is_err());
    }
}
