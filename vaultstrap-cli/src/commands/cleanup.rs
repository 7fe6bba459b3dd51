use crate::cli::{GlobalFlags, ServerFlags};
use anyhow::bail;
use clap::Args;
use std::path::PathBuf;
use vaultstrap::pipeline::compensate::compensate;
use vaultstrap::pipeline::{Compensator, InventoryCompensator};
use vaultstrap::runtime::constants::filenames;
use vaultstrap::LeakedResource;

#[derive(Args, Debug)]
pub struct CleanupArgs {
    #[command(flatten)]
    pub server: ServerFlags,

    /// Node whose record, client and key are removed
    #[arg(long, required = true)]
    pub node: String,

    /// Directory the node's client key was written to
    #[arg(long = "key-dir")]
    pub key_dir: Option<PathBuf>,

    /// Remove even when the node's latest recorded run did not fail
    #[arg(long)]
    pub force: bool,
}

/// Instances are not terminated here; use the cloud provider's tooling.
pub async fn execute(args: CleanupArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    if !args.force && !global.open_run_log()?.latest_run_failed(&args.node)? {
        bail!(
            "no failed run recorded for node '{}'; pass --force to remove it anyway",
            args.node
        );
    }
    if args.force {
        tracing::warn!(node = %args.node, "Forced cleanup, run log not consulted");
    }

    let key_dir = args
        .key_dir
        .clone()
        .unwrap_or_else(|| global.base_options().credential_dir);

    // Creation order, so release runs node first
    let leaked = vec![
        LeakedResource::Identity {
            name: args.node.clone(),
            key_path: filenames::client_key(&key_dir, &args.node),
        },
        LeakedResource::Node(args.node.clone()),
    ];

    let inventory = InventoryCompensator::new(args.server.inventory()?);
    let results = compensate(&leaked, &[&inventory as &dyn Compensator]).await;

    let mut failed = 0;
    for (resource, result) in results {
        match result {
            Ok(()) => println!("Removed {}", resource),
            Err(e) => {
                eprintln!("Error removing {}: {}", resource, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} resource(s) could not be removed", failed);
    }
    Ok(())
}
