//! Shared constants.

/// Secret store defaults.
pub mod vault {
    /// Vault (data bag) holding shared secret items.
    pub const DEFAULT_VAULT: &str = "vault";

    /// Suffix of the item carrying a secret's access-control metadata.
    pub const KEYS_SUFFIX: &str = "_keys";
}

/// Remote shell defaults.
pub mod ssh {
    pub const DEFAULT_USER: &str = "root";
    pub const DEFAULT_PORT: u16 = 22;
    pub const ROOT_USER: &str = "root";
}

/// Paths written on the bootstrapped host.
pub mod node_paths {
    pub const CONFIG_DIR: &str = "/etc/chef";
    pub const CLIENT_KEY: &str = "/etc/chef/client.pem";
    pub const CLIENT_RB: &str = "/etc/chef/client.rb";
    pub const FIRST_BOOT: &str = "/etc/chef/first-boot.json";
    pub const DATA_BAG_SECRET: &str = "/etc/chef/encrypted_data_bag_secret";
    pub const INSTALL_URL: &str = "https://www.chef.io/chef/install.sh";
}

pub mod envs {
    pub const VAULTSTRAP_HOME: &str = "VAULTSTRAP_HOME";
}
