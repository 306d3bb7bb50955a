//! Agent profiles and workload snapshots.

use serde::{Deserialize, Serialize};

use crate::model::ids::AgentId;
use crate::model::issue::Priority;

/// Static routing attributes of a support agent.
///
/// Live load is not part of the profile; it is tracked by the workload
/// registry so that concurrent assignments see one authoritative counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent: AgentId,
    /// Highest priority this agent may be routed.
    pub priority_ceiling: Priority,
    /// Agents flip this off for leave or focus time.
    pub available: bool,
}

impl AgentProfile {
    pub fn new(agent: impl Into<AgentId>, priority_ceiling: Priority) -> Self {
        Self {
            agent: agent.into(),
            priority_ceiling,
            available: true,
        }
    }

    /// Whether this agent may be routed an issue of the given priority.
    #[must_use]
    pub fn covers(&self, priority: Priority) -> bool {
        self.available && priority <= self.priority_ceiling
    }
}

/// Point-in-time view of one agent's standing, as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentWorkload {
    pub agent: AgentId,
    pub current_load: u32,
    pub capacity: u32,
    pub available: bool,
    pub priority_ceiling: Priority,
}

impl AgentWorkload {
    /// Whether another issue would fit under the capacity cap.
    #[must_use]
    pub const fn has_headroom(&self) -> bool {
        self.current_load < self.capacity
    }
}
