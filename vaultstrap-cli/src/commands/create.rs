use crate::cli::{GlobalFlags, ServerFlags};
use anyhow::{Context, bail};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use vaultstrap::rest::{HeaderSigner, RestCloud};
use vaultstrap::runtime::constants::settle_defaults;
use vaultstrap::runtime::{DataBagSecret, SettleStrategy, VaultstrapOptions};
use vaultstrap::{
    Backends, NodeRequest, Orchestrator, PipelineReport, RunList, ServerDefinition, SshExecutor,
};

type Attributes = serde_json::Map<String, serde_json::Value>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SettleMode {
    /// Query the inventory until the node is searchable
    Poll,
    /// Sleep for the whole settle window
    Fixed,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub server: ServerFlags,

    /// Comma separated list of roles/recipes to apply
    #[arg(short = 'r', long = "run-list")]
    pub run_list: Option<String>,

    /// Comma separated secret items to authorize the node on
    #[arg(long = "vault-items", value_delimiter = ',')]
    pub vault_items: Vec<String>,

    /// Vault holding the secret items
    #[arg(long)]
    pub vault: Option<String>,

    /// Normal attributes stored on the node record (JSON object)
    #[arg(short = 'p', long = "preseed-attributes")]
    pub preseed_attributes: Option<String>,

    /// Attributes written to the node's first-boot file (JSON object)
    #[arg(short = 'j', long = "json-attributes")]
    pub json_attributes: Option<String>,

    // --- Pre-provisioned host ---
    /// Hostname or IP address of an existing host; skips provisioning
    #[arg(long, requires = "node_name")]
    pub hostname: Option<String>,

    /// Name of the new client and node
    #[arg(long = "node-name", requires = "hostname")]
    pub node_name: Option<String>,

    // --- Cloud placement ---
    /// Image (AMI) for the server
    #[arg(short = 'I', long)]
    pub image: Option<String>,

    /// Flavor of server (m1.small, m1.medium, etc)
    #[arg(short = 'f', long)]
    pub flavor: Option<String>,

    #[arg(long)]
    pub region: Option<String>,

    #[arg(short = 'Z', long = "availability-zone")]
    pub availability_zone: Option<String>,

    /// Security groups; not allowed when using a subnet
    #[arg(short = 'G', long = "groups", value_delimiter = ',')]
    pub security_groups: Vec<String>,

    /// Security group ids; required when using a subnet
    #[arg(short = 'g', long = "security-group-ids", value_delimiter = ',')]
    pub security_group_ids: Vec<String>,

    #[arg(short = 's', long = "subnet")]
    pub subnet_id: Option<String>,

    /// Cloud ssh key pair name
    #[arg(short = 'S', long = "ssh-key")]
    pub ssh_key_name: Option<String>,

    #[arg(short = 'A', long = "aws-access-key-id", env = "AWS_ACCESS_KEY_ID")]
    pub access_key_id: Option<String>,

    #[arg(
        short = 'K',
        long = "aws-secret-access-key",
        env = "AWS_SECRET_ACCESS_KEY",
        hide_env_values = true
    )]
    pub secret_access_key: Option<String>,

    /// File with AWSAccessKeyId= and AWSSecretKey= lines
    #[arg(long = "aws-credential-file")]
    pub credential_file: Option<PathBuf>,

    /// Cloud instance API endpoint
    #[arg(long = "cloud-endpoint", env = "VAULTSTRAP_CLOUD_ENDPOINT")]
    pub cloud_endpoint: Option<String>,

    /// Probe this TCP port before treating an instance as ready
    #[arg(long = "probe-port")]
    pub probe_port: Option<u16>,

    // --- Remote shell ---
    #[arg(short = 'x', long = "ssh-user")]
    pub ssh_user: Option<String>,

    #[arg(long = "ssh-port")]
    pub ssh_port: Option<u16>,

    /// Jump host, user@host[:port]
    #[arg(short = 'w', long = "ssh-gateway")]
    pub ssh_gateway: Option<String>,

    #[arg(short = 'i', long = "identity-file")]
    pub identity_file: Option<PathBuf>,

    /// Execute the bootstrap via sudo
    #[arg(long)]
    pub sudo: bool,

    /// Skip host key verification
    #[arg(long = "no-host-key-verify")]
    pub no_host_key_verify: bool,

    // --- Bootstrap ---
    /// Agent version to install
    #[arg(long = "bootstrap-version")]
    pub bootstrap_version: Option<String>,

    /// Proxy server for the node being bootstrapped
    #[arg(long = "bootstrap-proxy")]
    pub bootstrap_proxy: Option<String>,

    /// Server URL written to the node, if different from --server-url
    #[arg(long = "bootstrap-server-url")]
    pub bootstrap_server_url: Option<String>,

    #[arg(short = 'E', long)]
    pub environment: Option<String>,

    #[arg(short = 'd', long)]
    pub distro: Option<String>,

    /// Install a prerelease agent
    #[arg(long)]
    pub prerelease: bool,

    /// Custom bootstrap template
    #[arg(long = "template-file")]
    pub template_file: Option<PathBuf>,

    /// Seconds to wait for the remote bootstrap
    #[arg(long = "bootstrap-timeout")]
    pub bootstrap_timeout: Option<u64>,

    /// Encrypted data bag secret to copy to the node
    #[arg(
        long,
        env = "VAULTSTRAP_SECRET",
        hide_env_values = true,
        conflicts_with = "secret_file"
    )]
    pub secret: Option<String>,

    /// File holding the encrypted data bag secret
    #[arg(long = "secret-file")]
    pub secret_file: Option<PathBuf>,

    // --- Settling ---
    #[arg(long, value_enum, default_value_t = SettleMode::Poll)]
    pub settle: SettleMode,

    /// Settle window in seconds (fixed delay, or poll budget)
    #[arg(long = "settle-wait")]
    pub settle_wait: Option<u64>,

    /// Directory for issued client keys
    #[arg(long = "key-dir")]
    pub key_dir: Option<PathBuf>,
}

impl CreateArgs {
    fn options(&self, global: &GlobalFlags) -> VaultstrapOptions {
        let mut options = global.base_options();
        if let Some(vault) = &self.vault {
            options.vault = vault.clone();
        }
        if let Some(dir) = &self.key_dir {
            options.credential_dir = dir.clone();
        }
        options.ssh_probe_port = self.probe_port;
        options.settle = self.settle_strategy();

        let cloud = &mut options.cloud;
        cloud.region = self.region.clone();
        cloud.access_key_id = self.access_key_id.clone();
        cloud.secret_access_key = self.secret_access_key.clone();
        cloud.credential_file = self.credential_file.clone();
        cloud.endpoint = self.cloud_endpoint.clone();

        let bootstrap = &mut options.bootstrap;
        if let Some(user) = &self.ssh_user {
            bootstrap.ssh_user = user.clone();
        }
        bootstrap.ssh_port = self.ssh_port;
        bootstrap.ssh_gateway = self.ssh_gateway.clone();
        bootstrap.identity_file = self.identity_file.clone();
        bootstrap.host_key_verify = !self.no_host_key_verify;
        bootstrap.use_sudo = self.sudo;
        bootstrap.server_url = self
            .bootstrap_server_url
            .clone()
            .unwrap_or_else(|| self.server.server_url.clone());
        bootstrap.environment = self.environment.clone();
        bootstrap.distro = self.distro.clone();
        bootstrap.bootstrap_version = self.bootstrap_version.clone();
        bootstrap.prerelease = self.prerelease;
        bootstrap.bootstrap_proxy = self.bootstrap_proxy.clone();
        bootstrap.template_file = self.template_file.clone();
        bootstrap.timeout = self.bootstrap_timeout.map(Duration::from_secs);
        bootstrap.secret = self.secret.clone().map(DataBagSecret::new);
        bootstrap.secret_file = self.secret_file.clone();

        options
    }

    fn settle_strategy(&self) -> SettleStrategy {
        let wait = self.settle_wait.map(Duration::from_secs);
        match self.settle {
            SettleMode::Fixed => SettleStrategy::Fixed {
                delay: wait.unwrap_or(settle_defaults::FIXED_DELAY),
            },
            SettleMode::Poll => SettleStrategy::Poll {
                interval: settle_defaults::POLL_INTERVAL,
                max_wait: wait.unwrap_or(settle_defaults::POLL_MAX_WAIT),
            },
        }
    }

    fn request(&self) -> anyhow::Result<NodeRequest> {
        let mut request = match (&self.hostname, &self.node_name) {
            (Some(host), Some(name)) => NodeRequest::existing(host, name),
            _ => NodeRequest::provision(self.definition()?),
        };

        if let Some(run_list) = &self.run_list {
            request = request.with_run_list(RunList::parse(run_list)?);
        }
        if let Some(json) = &self.preseed_attributes {
            request = request.with_seed_attributes(parse_attributes("preseed-attributes", json)?);
        }
        if let Some(json) = &self.json_attributes {
            request =
                request.with_first_boot_attributes(parse_attributes("json-attributes", json)?);
        }
        Ok(request.with_secret_items(self.vault_items.iter().filter(|i| !i.is_empty()).cloned()))
    }

    fn definition(&self) -> anyhow::Result<ServerDefinition> {
        let (Some(image), Some(flavor)) = (&self.image, &self.flavor) else {
            bail!("--image and --flavor are required unless --hostname is given");
        };

        let mut builder = ServerDefinition::builder(image, flavor);
        if let Some(region) = &self.region {
            builder.region(region);
        }
        if let Some(zone) = &self.availability_zone {
            builder.availability_zone(zone);
        }
        if let Some(subnet) = &self.subnet_id {
            builder.subnet_id(subnet);
        }
        if let Some(key) = &self.ssh_key_name {
            builder.ssh_key_name(key);
        }
        builder
            .security_groups(self.security_groups.clone())
            .security_group_ids(self.security_group_ids.clone());
        Ok(builder.build()?)
    }
}

fn parse_attributes(flag: &str, json: &str) -> anyhow::Result<Attributes> {
    let value: serde_json::Value =
        serde_json::from_str(json).with_context(|| format!("--{} is not valid JSON", flag))?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => bail!("--{} must be a JSON object", flag),
    }
}

pub async fn execute(args: CreateArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    let options = args.options(global);
    let request = args.request()?;

    // Reject bad flags before any backend is contacted
    options.sanitize()?;
    request.sanitize()?;
    tracing::debug!(
        provision = request.is_provision(),
        vault = %options.vault,
        items = request.secret_items.len(),
        "Flags validated"
    );

    let mut backends = Backends::new(
        args.server.inventory()?,
        args.server.secrets()?,
        Arc::new(SshExecutor::default()),
    );
    if request.is_provision() {
        backends = backends.with_cloud(cloud_backend(&options)?);
    }

    let orchestrator = Orchestrator::new(options, backends)?.with_run_log(global.open_run_log()?);

    match orchestrator.run(request).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(failure) => {
            for resource in &failure.leaked {
                eprintln!("Left behind: {}", resource);
            }
            if !failure.leaked.is_empty() {
                eprintln!(
                    "Run `vaultstrap cleanup --node <name>` to remove them once investigated"
                );
            }
            bail!("{}", failure)
        }
    }
}

fn cloud_backend(options: &VaultstrapOptions) -> anyhow::Result<Arc<RestCloud>> {
    let Some(endpoint) = &options.cloud.endpoint else {
        bail!("--cloud-endpoint is required to provision an instance");
    };
    let Some(credentials) = options.cloud.resolve_credentials()? else {
        bail!("cloud credentials are required: --aws-access-key-id/--aws-secret-access-key or --aws-credential-file");
    };
    let cloud = RestCloud::new(
        endpoint,
        &credentials,
        options.cloud.region.clone(),
        Arc::new(HeaderSigner::default()),
    )?;
    Ok(Arc::new(cloud))
}

fn print_report(report: &PipelineReport) {
    for warning in report.warnings() {
        eprintln!("Warning: {}", warning);
    }
    if let Some(instance) = &report.instance {
        println!("Instance: {} ({})", instance.id(), instance.address());
    }
    println!("Node:     {}", report.node_name);
    println!("Key:      {}", report.credential.key_path().display());
    for item in report.grants.granted() {
        println!("Granted:  {}", item);
    }
    println!("Run:      {}", report.run_id);
}
