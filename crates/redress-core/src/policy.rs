//! Engine policy: tunables loaded from `policy.toml`.
//!
//! Every field has a shipped default, so a missing file or a partial file
//! both work. Deployments override only what they need; an SLA band is
//! overridden whole:
//!
//! ```toml
//! reopen_window_days = 14
//! restricted_emails = ["contractor@example.com"]
//!
//! [sla.critical]
//! first_response_mins = 60
//! resolution_mins = 720
//! assignee_response_mins = 30
//! ```

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::model::issue::Priority;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_reopen_window_days() -> u32 {
    7
}

const fn default_conflict_retries() -> u32 {
    3
}

const fn default_agent_capacity() -> u32 {
    10
}

const fn default_sla_critical() -> SlaTargets {
    SlaTargets::new(120, 24 * 60, 60)
}

const fn default_sla_high() -> SlaTargets {
    SlaTargets::new(240, 48 * 60, 120)
}

const fn default_sla_medium() -> SlaTargets {
    SlaTargets::new(480, 96 * 60, 240)
}

const fn default_sla_low() -> SlaTargets {
    SlaTargets::new(24 * 60, 7 * 24 * 60, 480)
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Response-time targets for one priority band, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaTargets {
    pub first_response_mins: u32,
    pub resolution_mins: u32,
    /// Budget for the assignee's first action, measured from assignment.
    pub assignee_response_mins: u32,
}

impl SlaTargets {
    #[must_use]
    pub const fn new(
        first_response_mins: u32,
        resolution_mins: u32,
        assignee_response_mins: u32,
    ) -> Self {
        Self {
            first_response_mins,
            resolution_mins,
            assignee_response_mins,
        }
    }

    #[must_use]
    pub fn first_response(&self) -> Duration {
        Duration::minutes(i64::from(self.first_response_mins))
    }

    #[must_use]
    pub fn resolution(&self) -> Duration {
        Duration::minutes(i64::from(self.resolution_mins))
    }

    #[must_use]
    pub fn assignee_response(&self) -> Duration {
        Duration::minutes(i64::from(self.assignee_response_mins))
    }
}

/// SLA targets for all four priority bands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaPolicy {
    #[serde(default = "default_sla_critical")]
    pub critical: SlaTargets,
    #[serde(default = "default_sla_high")]
    pub high: SlaTargets,
    #[serde(default = "default_sla_medium")]
    pub medium: SlaTargets,
    #[serde(default = "default_sla_low")]
    pub low: SlaTargets,
}

impl SlaPolicy {
    /// Targets for the given priority band.
    #[must_use]
    pub const fn targets(&self, priority: Priority) -> &SlaTargets {
        match priority {
            Priority::Critical => &self.critical,
            Priority::High => &self.high,
            Priority::Medium => &self.medium,
            Priority::Low => &self.low,
        }
    }
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            critical: default_sla_critical(),
            high: default_sla_high(),
            medium: default_sla_medium(),
            low: default_sla_low(),
        }
    }
}

/// Tunables governing lifecycle windows, retries, routing, and the
/// restricted list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnginePolicy {
    /// Days an issue stays reopenable after resolution or closure.
    #[serde(default = "default_reopen_window_days")]
    pub reopen_window_days: u32,
    /// Attempts per optimistic write before giving up with a conflict.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
    /// Hard cap on concurrently assigned active issues per agent.
    #[serde(default = "default_agent_capacity")]
    pub agent_capacity: u32,
    /// Emails denied the mobile surface on top of directory flags.
    #[serde(default)]
    pub restricted_emails: Vec<String>,
    #[serde(default)]
    pub sla: SlaPolicy,
}

impl EnginePolicy {
    /// The reopen grace window as a duration.
    #[must_use]
    pub fn reopen_window(&self) -> Duration {
        Duration::days(i64::from(self.reopen_window_days))
    }

    /// Reject configurations the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.reopen_window_days == 0 {
            return Err(EngineError::validation("reopen_window_days must be >= 1"));
        }
        if self.conflict_retries == 0 {
            return Err(EngineError::validation("conflict_retries must be >= 1"));
        }
        if self.agent_capacity == 0 {
            return Err(EngineError::validation("agent_capacity must be >= 1"));
        }
        for priority in Priority::ALL {
            let targets = self.sla.targets(priority);
            if targets.first_response_mins == 0 || targets.resolution_mins == 0 {
                return Err(EngineError::validation(format!(
                    "sla.{priority} targets must be >= 1 minute"
                )));
            }
            if targets.first_response_mins > targets.resolution_mins {
                return Err(EngineError::validation(format!(
                    "sla.{priority} first response target exceeds the resolution target"
                )));
            }
        }
        Ok(())
    }
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            reopen_window_days: default_reopen_window_days(),
            conflict_retries: default_conflict_retries(),
            agent_capacity: default_agent_capacity(),
            restricted_emails: Vec::new(),
            sla: SlaPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load policy from a TOML file, falling back to defaults when absent.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed, or
/// when the parsed policy fails validation.
pub fn load_policy(path: &Path) -> Result<EnginePolicy> {
    if !path.exists() {
        debug!(path = %path.display(), "no policy file, using defaults");
        return Ok(EnginePolicy::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading policy file {}", path.display()))?;
    let policy: EnginePolicy =
        toml::from_str(&text).with_context(|| format!("parsing policy file {}", path.display()))?;
    policy
        .validate()
        .with_context(|| format!("validating policy file {}", path.display()))?;
    info!(
        path = %path.display(),
        reopen_window_days = policy.reopen_window_days,
        agent_capacity = policy.agent_capacity,
        "loaded engine policy"
    );
    Ok(policy)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
