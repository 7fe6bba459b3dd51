//! Configuration for Vaultstrap.
//!
//! Every component receives its settings from these structs at construction
//! time. Nothing reads process-wide mutable state after startup.

use crate::runtime::constants::envs as const_envs;
use crate::runtime::constants::{grant_defaults, provision_defaults, settle_defaults, ssh, vault};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use vaultstrap_shared::errors::ConfigError;

// ============================================================================
// Polling
// ============================================================================

/// Spacing and budget for a readiness poll loop.
///
/// Intervals grow by `multiplier` after every attempt, capped at `max_interval`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    #[serde(default = "default_initial_interval")]
    pub initial_interval: Duration,

    #[serde(default = "default_max_interval")]
    pub max_interval: Duration,

    #[serde(default = "default_multiplier")]
    pub multiplier: u32,

    #[serde(default = "default_max_wait")]
    pub max_wait: Duration,
}

fn default_initial_interval() -> Duration {
    provision_defaults::INITIAL_POLL_INTERVAL
}

fn default_max_interval() -> Duration {
    provision_defaults::MAX_POLL_INTERVAL
}

fn default_multiplier() -> u32 {
    provision_defaults::POLL_MULTIPLIER
}

fn default_max_wait() -> Duration {
    provision_defaults::MAX_WAIT
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: default_initial_interval(),
            max_interval: default_max_interval(),
            multiplier: default_multiplier(),
            max_wait: default_max_wait(),
        }
    }
}

impl PollPolicy {
    /// Fixed-interval policy.
    pub fn fixed(interval: Duration, max_wait: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            multiplier: 1,
            max_wait,
        }
    }

    /// Interval to sleep after an attempt that used `current`.
    pub fn next_interval(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.multiplier.max(1))
            .min(self.max_interval)
    }

    fn sanitize(&self, field: &str) -> Result<(), ConfigError> {
        if self.initial_interval.is_zero() {
            return Err(ConfigError::invalid(field, "poll interval must be non-zero"));
        }
        if self.max_interval < self.initial_interval {
            return Err(ConfigError::invalid(
                field,
                "max_interval must not be smaller than initial_interval",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Search-index settling
// ============================================================================

/// How to wait for a freshly created node to become searchable before
/// granting secret access by selector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SettleStrategy {
    /// Sleep for a fixed time. Never shortened, never extended.
    Fixed { delay: Duration },

    /// Query the inventory until the node resolves, proceeding anyway once
    /// `max_wait` has elapsed.
    Poll {
        interval: Duration,
        max_wait: Duration,
    },
}

impl Default for SettleStrategy {
    fn default() -> Self {
        SettleStrategy::Poll {
            interval: settle_defaults::POLL_INTERVAL,
            max_wait: settle_defaults::POLL_MAX_WAIT,
        }
    }
}

impl SettleStrategy {
    pub fn fixed_default() -> Self {
        SettleStrategy::Fixed {
            delay: settle_defaults::FIXED_DELAY,
        }
    }
}

// ============================================================================
// Cloud Options
// ============================================================================

/// Resolved cloud provider credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloudCredentials {
    AccessKeys {
        access_key_id: String,
        secret_access_key: String,
    },
    /// Credentials file, read by the provider backend.
    File(PathBuf),
}

impl std::fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloudCredentials::AccessKeys { access_key_id, .. } => f
                .debug_struct("AccessKeys")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"<redacted>")
                .finish(),
            CloudCredentials::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

impl CloudCredentials {
    /// Access key pair, reading the credentials file if needed.
    ///
    /// The file holds `key = value` lines; both `AWSAccessKeyId`/`AWSSecretKey`
    /// and `aws_access_key_id`/`aws_secret_access_key` spellings are accepted.
    pub fn access_keys(&self) -> Result<(String, String), ConfigError> {
        let path = match self {
            CloudCredentials::AccessKeys {
                access_key_id,
                secret_access_key,
            } => return Ok((access_key_id.clone(), secret_access_key.clone())),
            CloudCredentials::File(path) => path,
        };

        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::invalid("credential_file", format!("{}: {}", path.display(), e))
        })?;

        let mut id = None;
        let mut secret = None;
        for line in contents.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "AWSAccessKeyId" | "aws_access_key_id" => id = Some(value.trim().to_string()),
                "AWSSecretKey" | "aws_secret_access_key" => {
                    secret = Some(value.trim().to_string())
                }
                _ => {}
            }
        }

        match (id, secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            (None, _) => Err(ConfigError::Missing("aws_access_key_id".into())),
            (_, None) => Err(ConfigError::Missing("aws_secret_access_key".into())),
        }
    }
}

/// Cloud provider connection settings as supplied by the caller.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CloudOptions {
    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    #[serde(default)]
    pub credential_file: Option<PathBuf>,

    /// API endpoint for REST-backed providers.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl CloudOptions {
    /// Resolve the credential source.
    ///
    /// Access keys and a credentials file are mutually exclusive. Returns
    /// `Ok(None)` when neither is given (the backend may have its own chain).
    pub fn resolve_credentials(&self) -> Result<Option<CloudCredentials>, ConfigError> {
        let has_keys = self.access_key_id.is_some() || self.secret_access_key.is_some();

        match (&self.credential_file, has_keys) {
            (Some(_), true) => Err(ConfigError::MutuallyExclusive(
                "Either provide a credentials file or the access key and secret key but not both"
                    .into(),
            )),
            (Some(path), false) => Ok(Some(CloudCredentials::File(path.clone()))),
            (None, true) => match (&self.access_key_id, &self.secret_access_key) {
                (Some(id), Some(secret)) => Ok(Some(CloudCredentials::AccessKeys {
                    access_key_id: id.clone(),
                    secret_access_key: secret.clone(),
                })),
                (Some(_), None) => Err(ConfigError::Missing("aws_secret_access_key".into())),
                _ => Err(ConfigError::Missing("aws_access_key_id".into())),
            },
            (None, false) => Ok(None),
        }
    }
}

// ============================================================================
// Bootstrap Options
// ============================================================================

/// Remote convergence settings.
///
/// The ssh and installer fields are opaque pass-through options; the
/// dispatcher hands them to the remote shell or template without judging them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BootstrapOptions {
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,

    #[serde(default)]
    pub ssh_port: Option<u16>,

    #[serde(default)]
    pub ssh_gateway: Option<String>,

    #[serde(default)]
    pub identity_file: Option<PathBuf>,

    #[serde(default = "default_host_key_verify")]
    pub host_key_verify: bool,

    /// Force sudo. Non-root users always get sudo.
    #[serde(default)]
    pub use_sudo: bool,

    /// Inventory server URL written into the node's agent config.
    #[serde(default)]
    pub server_url: String,

    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub distro: Option<String>,

    /// Agent version to install. Latest when unset.
    #[serde(default)]
    pub bootstrap_version: Option<String>,

    #[serde(default)]
    pub prerelease: bool,

    #[serde(default)]
    pub bootstrap_proxy: Option<String>,

    /// Replaces the built-in convergence template.
    #[serde(default)]
    pub template_file: Option<PathBuf>,

    /// Local wait limit for the remote procedure.
    #[serde(default)]
    pub timeout: Option<Duration>,

    /// Encrypted data bag secret copied to the node.
    #[serde(default)]
    pub secret: Option<DataBagSecret>,

    /// File holding the encrypted data bag secret. Exclusive with `secret`.
    #[serde(default)]
    pub secret_file: Option<PathBuf>,
}

/// Shared secret for encrypted data bags, kept out of `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataBagSecret(String);

impl DataBagSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for DataBagSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataBagSecret(<redacted>)")
    }
}

fn default_ssh_user() -> String {
    ssh::DEFAULT_USER.to_string()
}

fn default_host_key_verify() -> bool {
    true
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            ssh_user: default_ssh_user(),
            ssh_port: None,
            ssh_gateway: None,
            identity_file: None,
            host_key_verify: default_host_key_verify(),
            use_sudo: false,
            server_url: String::new(),
            environment: None,
            distro: None,
            bootstrap_version: None,
            prerelease: false,
            bootstrap_proxy: None,
            template_file: None,
            timeout: None,
            secret: None,
            secret_file: None,
        }
    }
}

impl BootstrapOptions {
    /// Sudo is used when requested or when logging in as anyone but root.
    pub fn effective_sudo(&self) -> bool {
        self.use_sudo || self.ssh_user != ssh::ROOT_USER
    }

    fn sanitize(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::Missing("server_url".into()));
        }
        if self.ssh_user.trim().is_empty() {
            return Err(ConfigError::invalid("ssh_user", "must not be empty"));
        }
        if let Some(ref template) = self.template_file
            && !template.is_file()
        {
            return Err(ConfigError::invalid(
                "template_file",
                format!("{} does not exist", template.display()),
            ));
        }
        if let Some(timeout) = self.timeout
            && timeout.is_zero()
        {
            return Err(ConfigError::invalid("bootstrap timeout", "must be non-zero"));
        }
        if self.secret.is_some() && self.secret_file.is_some() {
            return Err(ConfigError::MutuallyExclusive(
                "Either provide the data bag secret or a secret file but not both".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Top-Level Options
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultstrapOptions {
    #[serde(default = "default_home_dir")]
    pub home_dir: PathBuf,

    /// Where issued client keys are written (`<dir>/<node>.pem`).
    #[serde(default = "default_credential_dir")]
    pub credential_dir: PathBuf,

    /// Vault holding the shared secret items.
    #[serde(default = "default_vault")]
    pub vault: String,

    #[serde(default)]
    pub provision: PollPolicy,

    /// TCP port probed before an instance counts as ready. No probe when unset.
    #[serde(default)]
    pub ssh_probe_port: Option<u16>,

    #[serde(default)]
    pub settle: SettleStrategy,

    #[serde(default = "default_grant_attempts")]
    pub grant_attempts: u32,

    #[serde(default)]
    pub cloud: CloudOptions,

    #[serde(default)]
    pub bootstrap: BootstrapOptions,
}

fn default_home_dir() -> PathBuf {
    std::env::var(const_envs::VAULTSTRAP_HOME)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = home_dir().unwrap_or_else(|| PathBuf::from("."));
            path.push(".vaultstrap");
            path
        })
}

fn default_credential_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_vault() -> String {
    vault::DEFAULT_VAULT.to_string()
}

fn default_grant_attempts() -> u32 {
    grant_defaults::MAX_ATTEMPTS
}

impl Default for VaultstrapOptions {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
            credential_dir: default_credential_dir(),
            vault: default_vault(),
            provision: PollPolicy::default(),
            ssh_probe_port: None,
            settle: SettleStrategy::default(),
            grant_attempts: default_grant_attempts(),
            cloud: CloudOptions::default(),
            bootstrap: BootstrapOptions::default(),
        }
    }
}

impl VaultstrapOptions {
    /// Validate all options. Runs before any external call.
    pub fn sanitize(&self) -> Result<(), ConfigError> {
        if self.vault.trim().is_empty() {
            return Err(ConfigError::invalid("vault", "must not be empty"));
        }
        if self.grant_attempts == 0 {
            return Err(ConfigError::invalid("grant_attempts", "must be at least 1"));
        }
        self.provision.sanitize("provision poll")?;
        if let SettleStrategy::Poll { interval, .. } = self.settle
            && interval.is_zero()
        {
            return Err(ConfigError::invalid("settle poll", "interval must be non-zero"));
        }
        self.cloud.resolve_credentials()?;
        self.bootstrap.sanitize()
    }
}
