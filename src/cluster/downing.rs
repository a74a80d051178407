//! Downing policy: the pluggable decision of which unreachable members
//! should be declared `Down` (spec §6). The coordinator never decides this
//! itself — it only applies whatever the policy returns via
//! [`crate::cluster::Cluster::apply_downing`].

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::address::UniqueAddress;

/// A snapshot of what a downing policy needs to make a decision: which
/// addresses are currently unreachable, and since when.
pub struct ReachabilityView<'a> {
    pub unreachable_since: &'a std::collections::HashMap<UniqueAddress, Instant>,
}

/// `(view, reachability) -> set<UniqueAddress to Down>` from spec §6.
/// Called by the leader on each leader tick.
pub trait DowningPolicy: Send + Sync {
    fn decide(&self, now: Instant, reachability: &ReachabilityView<'_>) -> HashSet<UniqueAddress>;
}

/// The built-in policy named in spec §6: marks any node unreachable for
/// longer than `auto_down_unreachable_after` as a downing candidate.
pub struct AutoDownUnreachableAfter {
    pub after: Duration,
}

impl AutoDownUnreachableAfter {
    pub fn new(after: Duration) -> Self {
        Self { after }
    }
}

impl DowningPolicy for AutoDownUnreachableAfter {
    fn decide(&self, now: Instant, reachability: &ReachabilityView<'_>) -> HashSet<UniqueAddress> {
        reachability
            .unreachable_since
            .iter()
            .filter_map(|(ua, since)| {
                if now.saturating_duration_since(*since) >= self.after {
                    Some(ua.clone())
                } else {
                    None
                }
            })
            .collect()
    }
}

/// A downing policy that never acts on its own — useful for tests that
/// drive `Cluster::apply_downing` directly and for deployments that
/// delegate downing decisions to a human or an external orchestrator.
/// Records every call it receives so tests can assert on them.
#[derive(Default)]
pub struct PuppetDowningPolicy {
    calls: Mutex<Vec<Instant>>,
}

impl PuppetDowningPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl DowningPolicy for PuppetDowningPolicy {
    fn decide(&self, now: Instant, _reachability: &ReachabilityView<'_>) -> HashSet<UniqueAddress> {
        self.calls.lock().unwrap().push(now);
        HashSet::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use std::collections::HashMap;

    fn ua(host: &str) -> UniqueAddress {
        UniqueAddress::new(Address::new("council", "test", host, 9000), 1)
    }

    #[test]
    fn auto_down_marks_nodes_unreachable_longer_than_threshold() {
        let policy = AutoDownUnreachableAfter::new(Duration::from_secs(5));
        let start = Instant::now();
        let mut map = HashMap::new();
        map.insert(ua("a"), start);
        let view = ReachabilityView {
            unreachable_since: &map,
        };

        let too_soon = policy.decide(start + Duration::from_secs(1), &view);
        assert!(too_soon.is_empty());

        let after = policy.decide(start + Duration::from_secs(6), &view);
        assert_eq!(after, HashSet::from([ua("a")]));
    }

    #[test]
    fn puppet_downing_policy_never_downs_but_records_calls() {
        let policy = PuppetDowningPolicy::new();
        let map = HashMap::new();
        let view = ReachabilityView {
            unreachable_since: &map,
        };
        assert!(policy.decide(Instant::now(), &view).is_empty());
        assert_eq!(policy.call_count(), 1);
    }
}
