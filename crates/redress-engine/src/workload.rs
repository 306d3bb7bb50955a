//! Workload registry: live per-agent load counters and routing lookups.
//!
//! # Design
//!
//! Load counters are atomics, and taking a slot is compare-and-swap
//! against the capacity cap, so two concurrent assignments can never push
//! an agent a slot over the cap. Registration order is recorded and breaks
//! load ties deterministically: the longest-registered agent wins.
//!
//! Registration is the staff roster: only dashboard-capable agents are
//! registered here, so a routing hit is already a routable target.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use redress_core::EngineError;
use redress_core::model::{AgentId, AgentProfile, AgentWorkload, Issue, Priority};

#[derive(Debug)]
struct AgentSlot {
    profile: RwLock<AgentProfile>,
    load: AtomicU32,
    /// Position in registration order, for deterministic tie-breaks.
    registered: u64,
}

/// Shared registry of agents and their live load.
#[derive(Debug)]
pub struct WorkloadRegistry {
    agents: RwLock<HashMap<AgentId, Arc<AgentSlot>>>,
    next_registration: AtomicU64,
    capacity: u32,
}

impl WorkloadRegistry {
    /// Create a registry where every agent shares the same capacity cap.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            next_registration: AtomicU64::new(0),
            capacity,
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Add an agent to the roster, or replace the profile of one already
    /// registered. Replacing keeps the agent's load and seniority.
    pub fn register(&self, profile: AgentProfile) {
        let mut agents = self.agents.write().expect("registry lock poisoned");
        if let Some(slot) = agents.get(&profile.agent) {
            *slot.profile.write().expect("profile lock poisoned") = profile;
            return;
        }
        let registered = self.next_registration.fetch_add(1, Ordering::Relaxed);
        agents.insert(
            profile.agent.clone(),
            Arc::new(AgentSlot {
                profile: RwLock::new(profile),
                load: AtomicU32::new(0),
                registered,
            }),
        );
    }

    /// Flip an agent's availability.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unregistered agent.
    pub fn set_available(&self, agent: &AgentId, available: bool) -> Result<(), EngineError> {
        let slot = self.slot(agent)?;
        slot.profile.write().expect("profile lock poisoned").available = available;
        Ok(())
    }

    /// The agent's routing profile, if registered.
    #[must_use]
    pub fn profile(&self, agent: &AgentId) -> Option<AgentProfile> {
        let agents = self.agents.read().expect("registry lock poisoned");
        agents
            .get(agent)
            .map(|slot| slot.profile.read().expect("profile lock poisoned").clone())
    }

    /// The agent's current load, if registered.
    #[must_use]
    pub fn load(&self, agent: &AgentId) -> Option<u32> {
        let agents = self.agents.read().expect("registry lock poisoned");
        agents.get(agent).map(|slot| slot.load.load(Ordering::SeqCst))
    }

    /// Take a slot of the agent's capacity. Fails when the agent is at or
    /// over the cap; never overshoots under concurrency.
    #[must_use]
    pub fn try_acquire(&self, agent: &AgentId) -> bool {
        let Some(slot) = self.slot_opt(agent) else {
            return false;
        };
        slot.load
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |load| {
                (load < self.capacity).then_some(load + 1)
            })
            .is_ok()
    }

    /// Take a slot unconditionally. Used where refusing is worse than
    /// briefly exceeding the cap, e.g. re-acquiring on reopen.
    pub fn force_acquire(&self, agent: &AgentId) {
        if let Some(slot) = self.slot_opt(agent) {
            slot.load.fetch_add(1, Ordering::SeqCst);
        } else {
            warn!(agent = %agent, "force acquire for unregistered agent ignored");
        }
    }

    /// Give a slot back.
    pub fn release(&self, agent: &AgentId) {
        let Some(slot) = self.slot_opt(agent) else {
            warn!(agent = %agent, "release for unregistered agent ignored");
            return;
        };
        let result = slot
            .load
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |load| {
                load.checked_sub(1)
            });
        if result.is_err() {
            warn!(agent = %agent, "release below zero ignored");
        }
    }

    /// Pick the least-loaded eligible agent and atomically take one of
    /// their slots. Eligible means available, ceiling at or above
    /// `priority`, and under the cap. Ties go to the longest-registered
    /// agent.
    #[must_use]
    pub fn acquire_least_loaded(&self, priority: Priority) -> Option<AgentId> {
        loop {
            let candidate = {
                let agents = self.agents.read().expect("registry lock poisoned");
                agents
                    .iter()
                    .filter_map(|(id, slot)| {
                        let profile = slot.profile.read().expect("profile lock poisoned");
                        if !profile.covers(priority) {
                            return None;
                        }
                        let load = slot.load.load(Ordering::SeqCst);
                        (load < self.capacity).then(|| (load, slot.registered, id.clone()))
                    })
                    .min_by_key(|(load, registered, _)| (*load, *registered))
                    .map(|(_, _, id)| id)
            };
            let agent = candidate?;
            if self.try_acquire(&agent) {
                debug!(agent = %agent, priority = %priority, "routed by load");
                return Some(agent);
            }
            // Lost the slot to a concurrent assignment; pick again.
        }
    }

    /// Dashboard snapshot, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AgentWorkload> {
        let agents = self.agents.read().expect("registry lock poisoned");
        let mut rows: Vec<(u64, AgentWorkload)> = agents
            .values()
            .map(|slot| {
                let profile = slot.profile.read().expect("profile lock poisoned");
                (
                    slot.registered,
                    AgentWorkload {
                        agent: profile.agent.clone(),
                        current_load: slot.load.load(Ordering::SeqCst),
                        capacity: self.capacity,
                        available: profile.available,
                        priority_ceiling: profile.priority_ceiling,
                    },
                )
            })
            .collect();
        rows.sort_by_key(|(registered, _)| *registered);
        rows.into_iter().map(|(_, row)| row).collect()
    }

    /// Recount loads from the issues that survive in storage. Called at
    /// startup, after the roster is registered.
    pub fn rebuild_from<'a>(&self, issues: impl IntoIterator<Item = &'a Issue>) {
        let agents = self.agents.read().expect("registry lock poisoned");
        for slot in agents.values() {
            slot.load.store(0, Ordering::SeqCst);
        }
        for issue in issues {
            if !issue.status.is_active() {
                continue;
            }
            let Some(assignee) = issue.assignee.as_ref() else {
                continue;
            };
            if let Some(slot) = agents.get(assignee) {
                slot.load.fetch_add(1, Ordering::SeqCst);
            } else {
                warn!(issue = %issue.id, agent = %assignee, "assignee missing from roster");
            }
        }
    }

    fn slot(&self, agent: &AgentId) -> Result<Arc<AgentSlot>, EngineError> {
        self.slot_opt(agent)
            .ok_or_else(|| EngineError::not_found("agent", agent.to_string()))
    }

    fn slot_opt(&self, agent: &AgentId) -> Option<Arc<AgentSlot>> {
        let agents = self.agents.read().expect("registry lock poisoned");
        agents.get(agent).cloned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    fn registry_with(agents: &[(&str, Priority)], capacity: u32) -> WorkloadRegistry {
        let registry = WorkloadRegistry::new(capacity);
        for (id, ceiling) in agents {
            registry.register(AgentProfile::new(*id, *ceiling));
        }
        registry
    }

    // -----------------------------------------------------------------------
    // Acquire and release
    // -----------------------------------------------------------------------

    #[test]
    fn test_acquire_up_to_cap_then_refuse() {
        let registry = registry_with(&[("agt-1", Priority::Critical)], 2);
        let agent = AgentId::from("agt-1");
        assert!(registry.try_acquire(&agent));
        assert!(registry.try_acquire(&agent));
        assert!(!registry.try_acquire(&agent));
        assert_eq!(registry.load(&agent), Some(2));
    }

    #[test]
    fn test_release_frees_a_slot() {
        let registry = registry_with(&[("agt-1", Priority::Critical)], 1);
        let agent = AgentId::from("agt-1");
        assert!(registry.try_acquire(&agent));
        registry.release(&agent);
        assert!(registry.try_acquire(&agent));
    }

    #[test]
    fn test_release_never_underflows() {
        let registry = registry_with(&[("agt-1", Priority::Critical)], 1);
        let agent = AgentId::from("agt-1");
        registry.release(&agent);
        assert_eq!(registry.load(&agent), Some(0));
    }

    #[test]
    fn test_force_acquire_ignores_cap() {
        let registry = registry_with(&[("agt-1", Priority::Critical)], 1);
        let agent = AgentId::from("agt-1");
        assert!(registry.try_acquire(&agent));
        registry.force_acquire(&agent);
        assert_eq!(registry.load(&agent), Some(2));
    }

    #[test]
    fn test_concurrent_acquires_never_exceed_cap() {
        let registry = Arc::new(registry_with(&[("agt-1", Priority::Critical)], 5));
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.try_acquire(&AgentId::from("agt-1"))
                })
            })
            .collect();

        let granted = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .filter(|granted| *granted)
            .count();
        assert_eq!(granted, 5);
        assert_eq!(registry.load(&AgentId::from("agt-1")), Some(5));
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    #[test]
    fn test_routes_to_least_loaded() {
        let registry = registry_with(
            &[("agt-1", Priority::Critical), ("agt-2", Priority::Critical)],
            10,
        );
        assert!(registry.try_acquire(&AgentId::from("agt-1")));
        let picked = registry
            .acquire_least_loaded(Priority::Medium)
            .expect("someone is eligible");
        assert_eq!(picked, AgentId::from("agt-2"));
    }

    #[test]
    fn test_tie_goes_to_earliest_registered() {
        let registry = registry_with(
            &[("agt-b", Priority::Critical), ("agt-a", Priority::Critical)],
            10,
        );
        // Equal loads; agt-b registered first and must win regardless of id.
        let picked = registry
            .acquire_least_loaded(Priority::Low)
            .expect("eligible");
        assert_eq!(picked, AgentId::from("agt-b"));
    }

    #[test]
    fn test_ceiling_filters_candidates() {
        let registry = registry_with(
            &[("agt-1", Priority::Medium), ("agt-2", Priority::Critical)],
            10,
        );
        let picked = registry
            .acquire_least_loaded(Priority::Critical)
            .expect("one agent covers critical");
        assert_eq!(picked, AgentId::from("agt-2"));
    }

    #[test]
    fn test_unavailable_agents_are_skipped() {
        let registry = registry_with(
            &[("agt-1", Priority::Critical), ("agt-2", Priority::Critical)],
            10,
        );
        registry
            .set_available(&AgentId::from("agt-1"), false)
            .expect("registered");
        let picked = registry
            .acquire_least_loaded(Priority::High)
            .expect("one remains");
        assert_eq!(picked, AgentId::from("agt-2"));
    }

    #[test]
    fn test_no_candidate_when_everyone_full() {
        let registry = registry_with(&[("agt-1", Priority::Critical)], 1);
        assert!(registry.try_acquire(&AgentId::from("agt-1")));
        assert!(registry.acquire_least_loaded(Priority::Low).is_none());
    }

    #[test]
    fn test_reregistration_keeps_load_and_seniority() {
        let registry = registry_with(
            &[("agt-1", Priority::Medium), ("agt-2", Priority::Critical)],
            10,
        );
        assert!(registry.try_acquire(&AgentId::from("agt-1")));

        // Raising the ceiling must not reset the counter or the order.
        registry.register(AgentProfile::new("agt-1", Priority::Critical));
        assert_eq!(registry.load(&AgentId::from("agt-1")), Some(1));
        let profile = registry.profile(&AgentId::from("agt-1")).expect("present");
        assert_eq!(profile.priority_ceiling, Priority::Critical);
    }

    // -----------------------------------------------------------------------
    // Snapshot and rebuild
    // -----------------------------------------------------------------------

    #[test]
    fn test_snapshot_in_registration_order() {
        let registry = registry_with(
            &[("agt-z", Priority::Critical), ("agt-a", Priority::High)],
            10,
        );
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].agent, AgentId::from("agt-z"));
        assert_eq!(snapshot[1].agent, AgentId::from("agt-a"));
        assert_eq!(snapshot[0].capacity, 10);
    }

    #[test]
    fn test_rebuild_counts_only_active_assigned_issues() {
        use chrono::{TimeZone, Utc};
        use redress_core::model::{IssueCategory, IssueDraft, IssueId, PrincipalId, Status};

        let registry = registry_with(&[("agt-1", Priority::Critical)], 10);
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        let mut active = Issue::file(
            IssueId::new("gr-rebuild00001"),
            IssueDraft {
                category: IssueCategory::new("it", "email"),
                subject: "Mail delayed".to_string(),
                detail: String::new(),
                priority: Priority::Medium,
            },
            PrincipalId::from("emp-1"),
            now,
        );
        active.assignee = Some(AgentId::from("agt-1"));
        active.assigned_at = Some(now);

        let mut resolved = active.clone();
        resolved.id = IssueId::new("gr-rebuild00002");
        resolved.status = Status::Resolved;
        resolved.resolved_at = Some(now);
        resolved.reopenable_until = Some(now + chrono::Duration::days(7));
        resolved.resolution_note = Some("done".to_string());

        registry.rebuild_from([&active, &resolved]);
        assert_eq!(registry.load(&AgentId::from("agt-1")), Some(1));
    }
}
