//! Node orchestration.
//!
//! ## Architecture
//!
//! One [`Orchestrator::run`] takes one [`NodeRequest`] through five stages:
//!
//! ```text
//! 1. Provision ──→ 2. Identity ──→ 3. Register ──→ 4. Secrets ──→ 5. Bootstrap
//! ```
//!
//! Stages run strictly in sequence, each consuming the previous stage's
//! output. The first error aborts the run with a [`PipelineFailure`] listing
//! everything created so far; nothing is rolled back automatically (see
//! [`compensate`]). Secret grant failures are the exception: they are
//! collected in the report and the run continues to bootstrap.
//!
//! Concurrent runs may share one orchestrator.

pub mod compensate;
mod stages;
mod state;
mod types;

pub use compensate::{CloudCompensator, Compensator, InventoryCompensator};
pub use state::{PipelineState, Stage};
pub use types::{
    Backends, LeakedResource, NodeRequest, NodeTarget, PipelineFailure, PipelineReport,
};

use crate::provision::InstanceId;
use crate::runlog::{RunLog, RunOutcome};
use crate::runtime::options::VaultstrapOptions;
use crate::vault::GrantReport;
use std::sync::Arc;
use std::time::Instant;
use types::{BootstrapInput, IdentityInput, ProvisionInput, RegisterInput, SecretsInput};
use ulid::Ulid;
use vaultstrap_shared::errors::{ConfigError, IssuanceError, VaultstrapError, VaultstrapResult};

/// Drives node orchestrations against a fixed set of backends.
pub struct Orchestrator {
    options: VaultstrapOptions,
    backends: Backends,
    run_log: Option<Arc<RunLog>>,
}

impl Orchestrator {
    /// Validates `options` before anything else happens.
    pub fn new(options: VaultstrapOptions, backends: Backends) -> VaultstrapResult<Self> {
        options.sanitize()?;
        Ok(Self {
            options,
            backends,
            run_log: None,
        })
    }

    /// Append every stage transition to `run_log`.
    pub fn with_run_log(mut self, run_log: Arc<RunLog>) -> Self {
        self.run_log = Some(run_log);
        self
    }

    pub fn options(&self) -> &VaultstrapOptions {
        &self.options
    }

    pub async fn run(&self, request: NodeRequest) -> Result<PipelineReport, PipelineFailure> {
        let mut ctx = PipelineContext::new(self.run_log.clone());
        tracing::info!(run_id = %ctx.run_id, "Starting orchestration");

        if let Err(e) = self.preflight(&request) {
            return Err(ctx.fail(Stage::Config, e.into()));
        }

        // Stage 1: Provision
        let (instance, host, node_name) = match request.target {
            NodeTarget::Provision(ref definition) => {
                let Some(cloud) = self.backends.cloud.clone() else {
                    return Err(ctx.fail(
                        Stage::Config,
                        ConfigError::Missing("cloud provider".into()).into(),
                    ));
                };
                let timer = Instant::now();
                match stages::provision::run(ProvisionInput {
                    options: &self.options,
                    cloud,
                    definition,
                })
                .await
                {
                    Ok(instance) => {
                        let id = instance.id().as_str().to_string();
                        ctx.node = id.clone();
                        ctx.leaked.push(LeakedResource::Instance(instance.id().clone()));
                        ctx.complete(Stage::Provision, Some(instance.address()), timer);
                        let host = instance.address().to_string();
                        (Some(instance), host, id)
                    }
                    Err(e) => {
                        if let Some(id) = e.instance_id() {
                            ctx.node = id.to_string();
                            ctx.leaked.push(LeakedResource::Instance(InstanceId::new(id)));
                        }
                        return Err(ctx.fail(Stage::Provision, e.into()));
                    }
                }
            }
            NodeTarget::Existing { ref host, ref name } => {
                ctx.node = name.clone();
                ctx.skip(Stage::Provision);
                (None, host.clone(), name.clone())
            }
        };

        // Stage 2: Identity
        let timer = Instant::now();
        let credential = match stages::identity::run(IdentityInput {
            options: &self.options,
            inventory: self.backends.inventory.clone(),
            name: &node_name,
        })
        .await
        {
            Ok(credential) => {
                ctx.leaked.push(LeakedResource::Identity {
                    name: credential.name().to_string(),
                    key_path: credential.key_path().to_path_buf(),
                });
                ctx.complete(Stage::Identity, None, timer);
                credential
            }
            Err(e) => {
                // Client exists server-side even though its key was lost
                if let IssuanceError::Storage { ref path, .. } = e {
                    ctx.leaked.push(LeakedResource::Identity {
                        name: node_name.clone(),
                        key_path: path.clone(),
                    });
                }
                return Err(ctx.fail(Stage::Identity, e.into()));
            }
        };

        // Stage 3: Register
        let timer = Instant::now();
        let node = match stages::register::run(RegisterInput {
            options: &self.options,
            inventory: self.backends.inventory.clone(),
            credential: &credential,
            request: &request,
        })
        .await
        {
            Ok(node) => {
                ctx.leaked.push(LeakedResource::Node(node.name.clone()));
                ctx.complete(Stage::Register, None, timer);
                node
            }
            Err(e) => return Err(ctx.fail(Stage::Register, e.into())),
        };

        // Stage 4: Secrets
        let grants = if request.secret_items.is_empty() {
            ctx.skip(Stage::Secrets);
            GrantReport::default()
        } else {
            let timer = Instant::now();
            let report = stages::secrets::run(SecretsInput {
                options: &self.options,
                inventory: self.backends.inventory.clone(),
                secrets: self.backends.secrets.clone(),
                node_name: &node_name,
                items: &request.secret_items,
            })
            .await;
            let detail = format!(
                "{}/{} items granted",
                report.granted().len(),
                report.len()
            );
            ctx.complete(Stage::Secrets, Some(&detail), timer);
            report
        };

        // Stage 5: Bootstrap
        let timer = Instant::now();
        let bootstrap = match stages::bootstrap::run(BootstrapInput {
            options: &self.options,
            executor: self.backends.executor.clone(),
            host: &host,
            node_name: &node_name,
            credential: &credential,
            request: &request,
        })
        .await
        {
            Ok(output) => {
                ctx.complete(Stage::Bootstrap, None, timer);
                output
            }
            Err(e) => return Err(ctx.fail(Stage::Bootstrap, e.into())),
        };

        tracing::info!(
            run_id = %ctx.run_id,
            node = %node_name,
            warnings = grants.failures().len(),
            "Orchestration complete"
        );

        Ok(PipelineReport {
            run_id: ctx.run_id,
            node_name,
            instance,
            credential,
            node,
            grants,
            bootstrap,
            state: ctx.state,
        })
    }

    fn preflight(&self, request: &NodeRequest) -> Result<(), ConfigError> {
        request.sanitize()?;
        if request.is_provision() && self.backends.cloud.is_none() {
            return Err(ConfigError::Missing("cloud provider".into()));
        }
        Ok(())
    }
}

/// Bookkeeping for one run: progress, leaks and run-log entries.
struct PipelineContext {
    run_id: Ulid,
    node: String,
    state: PipelineState,
    leaked: Vec<LeakedResource>,
    run_log: Option<Arc<RunLog>>,
}

impl PipelineContext {
    fn new(run_log: Option<Arc<RunLog>>) -> Self {
        Self {
            run_id: Ulid::new(),
            node: String::new(),
            state: PipelineState::Start,
            leaked: Vec::new(),
            run_log,
        }
    }

    fn complete(&mut self, stage: Stage, detail: Option<&str>, timer: Instant) {
        tracing::info!(
            run_id = %self.run_id,
            node = %self.node,
            stage = %stage,
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "Stage completed"
        );
        self.advance(stage.completed_state());
        self.record(stage, RunOutcome::Completed, detail);
    }

    fn skip(&mut self, stage: Stage) {
        tracing::debug!(run_id = %self.run_id, node = %self.node, stage = %stage, "Stage skipped");
        self.record(stage, RunOutcome::Skipped, None);
    }

    fn fail(&mut self, stage: Stage, error: VaultstrapError) -> PipelineFailure {
        let leaked = std::mem::take(&mut self.leaked);
        tracing::error!(
            run_id = %self.run_id,
            node = %self.node,
            stage = %stage,
            error = %error,
            leaked = leaked.len(),
            "Orchestration failed"
        );
        self.advance(PipelineState::Failed(stage));
        self.record(stage, RunOutcome::Failed, Some(&error.to_string()));

        PipelineFailure {
            run_id: self.run_id,
            stage,
            error,
            leaked,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        if let Err(e) = self.state.transition_to(next) {
            tracing::warn!(run_id = %self.run_id, error = %e, "Unexpected pipeline transition");
            self.state = next;
        }
    }

    /// Run-log failures never fail the run.
    fn record(&self, stage: Stage, outcome: RunOutcome, detail: Option<&str>) {
        let Some(ref log) = self.run_log else {
            return;
        };
        if let Err(e) = log.record(&self.run_id, &self.node, stage, outcome, detail) {
            tracing::warn!(run_id = %self.run_id, error = %e, "Failed to append to run log");
        }
    }
}
