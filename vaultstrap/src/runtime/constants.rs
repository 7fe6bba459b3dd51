//! Constants for the Vaultstrap runtime
//!
//! Centralized location for default timings, names and file layout.

// Re-export shared constants
pub use vaultstrap_shared::constants::{envs, node_paths, ssh, vault};

/// Instance readiness polling defaults
pub mod provision_defaults {
    use std::time::Duration;

    pub const INITIAL_POLL_INTERVAL: Duration = Duration::from_secs(2);
    pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(15);
    pub const POLL_MULTIPLIER: u32 = 2;

    /// Total time to wait for an instance to become ready
    pub const MAX_WAIT: Duration = Duration::from_secs(600);

    /// Per-attempt TCP connect timeout for the reachability probe
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Search-index settling defaults
pub mod settle_defaults {
    use std::time::Duration;

    /// Fixed settling delay used by the `Fixed` strategy
    pub const FIXED_DELAY: Duration = Duration::from_secs(60);

    pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
    pub const POLL_MAX_WAIT: Duration = Duration::from_secs(60);
}

/// Secret grant defaults
pub mod grant_defaults {
    /// Load/modify/save attempts before giving up on a contended item
    pub const MAX_ATTEMPTS: u32 = 5;
}

/// File naming patterns
pub mod filenames {
    use std::path::{Path, PathBuf};

    pub const RUN_LOG_DB: &str = "runs.db";
    /// Rotated daily; files are named `vaultstrap.log.YYYY-MM-DD`.
    pub const LOG_FILE_PREFIX: &str = "vaultstrap.log";

    /// Node-scoped client key location
    pub fn client_key(dir: &Path, node_name: &str) -> PathBuf {
        dir.join(format!("{}.pem", node_name))
    }
}
