use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use vaultstrap::rest::{HeaderSigner, Principal, RestInventory, RestSecretStore};
use vaultstrap::runtime::HomeLayout;
use vaultstrap::runtime::constants::filenames;
use vaultstrap::{RunLog, VaultstrapOptions};

/// Vaultstrap - provision, register, grant and bootstrap a managed node
#[derive(Parser, Debug)]
#[command(name = "vaultstrap")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bring up one node: provision, register, grant and bootstrap
    Create(crate::commands::create::CreateArgs),

    /// List recorded orchestration runs
    Runs(crate::commands::runs::RunsArgs),

    /// Delete resources left behind by a failed run
    Cleanup(crate::commands::cleanup::CleanupArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Vaultstrap home directory (run log, logs)
    #[arg(long, global = true, env = "VAULTSTRAP_HOME")]
    pub home: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

impl GlobalFlags {
    /// Options with the home directory applied and everything else defaulted.
    pub fn base_options(&self) -> VaultstrapOptions {
        let mut options = VaultstrapOptions::default();
        if let Some(home) = &self.home {
            options.home_dir = home.clone();
        }
        options
    }

    pub fn layout(&self) -> HomeLayout {
        HomeLayout::new(self.base_options().home_dir)
    }

    pub fn open_run_log(&self) -> anyhow::Result<Arc<RunLog>> {
        let path = self.layout().run_log_path();
        let log = RunLog::open(&path)
            .with_context(|| format!("Failed to open run log at {}", path.display()))?;
        Ok(Arc::new(log))
    }

    /// Install stderr and file logging.
    ///
    /// The returned guard flushes the file writer on drop and must outlive
    /// every command.
    pub fn init_logging(&self) -> anyhow::Result<WorkerGuard> {
        let layout = self.layout();
        layout.prepare()?;

        let file_appender =
            tracing_appender::rolling::daily(layout.logs_dir(), filenames::LOG_FILE_PREFIX);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.log_level))
            .context("Invalid log level")?;

        vaultstrap::util::register_to_tracing(non_blocking, env_filter);
        Ok(guard)
    }
}

/// Inventory server connection shared by commands that talk to it.
#[derive(Args, Debug, Clone)]
pub struct ServerFlags {
    /// Inventory server URL
    #[arg(long = "server-url", env = "VAULTSTRAP_SERVER_URL")]
    pub server_url: String,

    /// Administrative client used for client creation, search and grants
    #[arg(long = "admin-client", env = "VAULTSTRAP_ADMIN_CLIENT")]
    pub admin_client: String,

    /// Key of the administrative client
    #[arg(long = "admin-key", env = "VAULTSTRAP_ADMIN_KEY")]
    pub admin_key: Option<PathBuf>,
}

impl ServerFlags {
    fn admin(&self) -> Principal {
        match &self.admin_key {
            Some(key) => Principal::with_key(self.admin_client.clone(), key.clone()),
            None => Principal::new(self.admin_client.clone()),
        }
    }

    pub fn inventory(&self) -> anyhow::Result<Arc<RestInventory>> {
        let inventory =
            RestInventory::new(&self.server_url, self.admin(), Arc::new(HeaderSigner::default()))?;
        Ok(Arc::new(inventory))
    }

    pub fn secrets(&self) -> anyhow::Result<Arc<RestSecretStore>> {
        let store =
            RestSecretStore::new(&self.server_url, self.admin(), Arc::new(HeaderSigner::default()))?;
        Ok(Arc::new(store))
    }
}
