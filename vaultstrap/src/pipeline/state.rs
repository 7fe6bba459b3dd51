//! Pipeline stages and progress state machine.

use serde::{Deserialize, Serialize};
use vaultstrap_shared::errors::{VaultstrapError, VaultstrapResult};

/// A unit of work in one orchestration, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Option and request validation, before any side effect.
    Config,
    Provision,
    Identity,
    Register,
    /// Settle wait plus access grants.
    Secrets,
    Bootstrap,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::Provision => "provision",
            Stage::Identity => "identity",
            Stage::Register => "register",
            Stage::Secrets => "secrets",
            Stage::Bootstrap => "bootstrap",
        }
    }

    /// State reached when this stage succeeds.
    pub fn completed_state(&self) -> PipelineState {
        match self {
            Stage::Config => PipelineState::Start,
            Stage::Provision => PipelineState::Provisioned,
            Stage::Identity => PipelineState::Identified,
            Stage::Register => PipelineState::Registered,
            Stage::Secrets => PipelineState::SecretsGranted,
            Stage::Bootstrap => PipelineState::Bootstrapped,
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config" => Ok(Stage::Config),
            "provision" => Ok(Stage::Provision),
            "identity" => Ok(Stage::Identity),
            "register" => Ok(Stage::Register),
            "secrets" => Ok(Stage::Secrets),
            "bootstrap" => Ok(Stage::Bootstrap),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one orchestration.
///
/// ```text
/// Start → Provisioned → Identified → Registered → SecretsGranted → Bootstrapped
/// ```
///
/// The provision stage is skipped for existing hosts and the secrets stage
/// when no items are requested. Any non-terminal state may fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    Start,
    Provisioned,
    Identified,
    Registered,
    SecretsGranted,
    Bootstrapped,
    Failed(Stage),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Bootstrapped | PipelineState::Failed(_))
    }

    /// Check if transition to target state is valid. Progress never moves backwards.
    pub fn can_transition_to(&self, target: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, target),
            (Start, Provisioned) |
            // Existing host
            (Start, Identified) |
            (Provisioned, Identified) |
            (Identified, Registered) |
            (Registered, SecretsGranted) |
            // No secret items requested
            (Registered, Bootstrapped) |
            (SecretsGranted, Bootstrapped)
        ) || (!self.is_terminal() && matches!(target, Failed(_)))
    }

    /// Validate and apply a transition.
    pub fn transition_to(&mut self, target: PipelineState) -> VaultstrapResult<()> {
        if !self.can_transition_to(target) {
            return Err(VaultstrapError::Internal(format!(
                "Cannot transition pipeline from {} to {}",
                self, target
            )));
        }
        *self = target;
        Ok(())
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Start => f.write_str("start"),
            PipelineState::Provisioned => f.write_str("provisioned"),
            PipelineState::Identified => f.write_str("identified"),
            PipelineState::Registered => f.write_str("registered"),
            PipelineState::SecretsGranted => f.write_str("secrets-granted"),
            PipelineState::Bootstrapped => f.write_str("bootstrapped"),
            PipelineState::Failed(stage) => write!(f, "failed({})", stage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_path() {
        let mut state = PipelineState::Start;
        for stage in [
            Stage::Provision,
            Stage::Identity,
            Stage::Register,
            Stage::Secrets,
            Stage::Bootstrap,
        ] {
            state.transition_to(stage.completed_state()).unwrap();
        }
        assert_eq!(state, PipelineState::Bootstrapped);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_skips() {
        assert!(PipelineState::Start.can_transition_to(PipelineState::Identified));
        assert!(PipelineState::Registered.can_transition_to(PipelineState::Bootstrapped));
    }

    #[test]
    fn test_never_backwards() {
        assert!(!PipelineState::Registered.can_transition_to(PipelineState::Identified));
        assert!(!PipelineState::Bootstrapped.can_transition_to(PipelineState::Start));
        assert!(!PipelineState::Identified.can_transition_to(PipelineState::Bootstrapped));

        let mut state = PipelineState::Registered;
        assert!(state.transition_to(PipelineState::Provisioned).is_err());
        assert_eq!(state, PipelineState::Registered);
    }

    #[test]
    fn test_failure_is_terminal() {
        let mut state = PipelineState::Identified;
        state
            .transition_to(PipelineState::Failed(Stage::Register))
            .unwrap();
        assert!(!state.can_transition_to(PipelineState::Registered));
        assert!(!state.can_transition_to(PipelineState::Failed(Stage::Bootstrap)));
        assert_eq!(state.to_string(), "failed(register)");
    }

    #[test]
    fn test_stage_round_trip() {
        for stage in [Stage::Config, Stage::Secrets, Stage::Bootstrap] {
            assert_eq!(stage.as_str().parse::<Stage>(), Ok(stage));
        }
        assert!("unknown".parse::<Stage>().is_err());
    }
}
