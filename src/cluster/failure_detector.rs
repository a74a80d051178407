//! A phi-accrual failure detector (Hayashibara, Défago, Yared & Katayama,
//! 2004), the same algorithm Akka uses on the JVM. The coordinator consumes
//! only its boolean "reachable?" signal (spec §6); nothing outside this
//! module looks at `phi` directly.
//!
//! > The suspicion level of failure is represented by a value called phi.
//! > The basic idea of the phi failure detector is to express the value of
//! > phi on a scale that is dynamically adjusted to reflect current network
//! > conditions.

use std::{
    collections::{HashMap, LinkedList},
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::address::UniqueAddress;

const HEARTBEAT_INTERVALS_WINDOW_SIZE: u32 = 100;

/// What [`Cluster`](crate::cluster::Cluster) needs from a failure detector:
/// feed it heartbeats, forget a member once it's gone, ask whether an
/// address currently looks reachable. `&self`-only (state lives behind a
/// [`Mutex`] in the phi-accrual implementation below) so `Cluster` can hold
/// it as a plain `Arc<dyn FailureDetectorBackend>` — the same shape as its
/// `downing_policy` sibling field — and tests can substitute
/// [`PuppetFailureDetector`] for deterministic control.
pub trait FailureDetectorBackend: Send + Sync {
    fn record_heartbeat(&self, ua: UniqueAddress, sequence: u64);
    fn forget(&self, ua: &UniqueAddress);
    fn is_reachable(&self, ua: &UniqueAddress, now: Instant) -> bool;
}

#[derive(Debug)]
pub struct FailureDetector {
    this_unique_address: UniqueAddress,
    members: Mutex<HashMap<UniqueAddress, FailureDetectorMember>>,
    pub phi_threshold: f64,
}

impl FailureDetector {
    pub fn new(this_unique_address: UniqueAddress, phi_threshold: f64) -> Self {
        Self {
            this_unique_address,
            members: Mutex::new(HashMap::new()),
            phi_threshold,
        }
    }

    pub fn record_heartbeat(&self, ua: UniqueAddress, last_heartbeat: u64) {
        debug_assert_ne!(ua, self.this_unique_address);

        let mut members = self.members.lock().unwrap();
        match members.get_mut(&ua) {
            Some(member) if member.last_heartbeat < last_heartbeat => {
                member.record_heartbeat(last_heartbeat);
            }
            None => {
                members.insert(ua, FailureDetectorMember::new(last_heartbeat));
            }
            _ => (),
        }
    }

    pub fn forget(&self, ua: &UniqueAddress) {
        self.members.lock().unwrap().remove(ua);
    }

    pub fn is_reachable(&self, ua: &UniqueAddress, now: Instant) -> bool {
        self.members
            .lock()
            .unwrap()
            .get(ua)
            .and_then(|n| n.phi(now))
            .map(|phi| phi < self.phi_threshold)
            // Unknown members are assumed reachable: we have no evidence of
            // trouble yet.
            .unwrap_or(true)
    }
}

impl FailureDetectorBackend for FailureDetector {
    fn record_heartbeat(&self, ua: UniqueAddress, sequence: u64) {
        FailureDetector::record_heartbeat(self, ua, sequence)
    }

    fn forget(&self, ua: &UniqueAddress) {
        FailureDetector::forget(self, ua)
    }

    fn is_reachable(&self, ua: &UniqueAddress, now: Instant) -> bool {
        FailureDetector::is_reachable(self, ua, now)
    }
}

#[derive(Clone, Debug)]
pub struct FailureDetectorMember {
    pub last_heartbeat: u64,
    last_heartbeat_received_at: Instant,
    heartbeats_intervals: LinkedList<Duration>,
    heartbeats_intervals_mean: Option<Duration>,
    heartbeats_interval_std_dev: Option<Duration>,
}

impl FailureDetectorMember {
    fn new(last_heartbeat: u64) -> Self {
        Self {
            last_heartbeat,
            last_heartbeat_received_at: Instant::now(),
            heartbeats_intervals: LinkedList::new(),
            heartbeats_intervals_mean: None,
            heartbeats_interval_std_dev: None,
        }
    }

    fn refresh_stats(&mut self) {
        let count = self.heartbeats_intervals.len();
        if count > 0 {
            let sum: Duration = self.heartbeats_intervals.iter().sum();
            let mean = sum / count as u32;
            let mean_f64 = mean.as_secs_f64();
            let variance: f64 = self
                .heartbeats_intervals
                .iter()
                .map(|interval| {
                    let diff = mean_f64 - interval.as_secs_f64();
                    diff * diff
                })
                .sum::<f64>()
                / count as f64;
            self.heartbeats_intervals_mean = Some(mean);
            self.heartbeats_interval_std_dev = Some(Duration::from_secs_f64(variance.sqrt()));
        } else {
            self.heartbeats_intervals_mean = None;
            self.heartbeats_interval_std_dev = None;
        }
    }

    pub fn phi(&self, now: Instant) -> Option<f64> {
        match (self.heartbeats_intervals_mean, self.heartbeats_interval_std_dev) {
            (Some(mean), Some(std_dev)) if std_dev.as_secs_f64() > 0.0 => {
                let x = (now - self.last_heartbeat_received_at).as_secs_f64();
                let mean = mean.as_secs_f64();
                let std_dev = std_dev.as_secs_f64();
                let cdf_at_x = 0.5 * (mean - x) / (std_dev * std::f64::consts::SQRT_2);
                Some(1.0 - cdf_at_x.log10())
            }
            _ => None,
        }
    }

    fn insert_interval(&mut self, interval: Duration) {
        if self.heartbeats_intervals.len() == HEARTBEAT_INTERVALS_WINDOW_SIZE as usize {
            self.heartbeats_intervals.pop_front();
        }
        self.heartbeats_intervals.push_back(interval);
    }

    fn record_heartbeat(&mut self, last_heartbeat: u64) {
        let received_at = Instant::now();
        let elapsed = received_at - self.last_heartbeat_received_at;
        let delta_heartbeats = (last_heartbeat - self.last_heartbeat) as u32;
        let mean_per_heartbeat = elapsed / delta_heartbeats.max(1);
        for _ in 0..delta_heartbeats {
            self.insert_interval(mean_per_heartbeat);
        }
        self.last_heartbeat = last_heartbeat;
        self.last_heartbeat_received_at = received_at;
        self.refresh_stats();
    }
}

/// A directly-controllable failure detector for tests: no wall-clock
/// timing, just an explicit reachable/unreachable flag per address. Spec
/// §6 calls this out by name ("a 'puppet' implementation is expected").
/// `&self`-based (state behind a `Mutex`) so a test can hold an `Arc` clone
/// alongside the one injected into `Cluster` and flip a node's reachability
/// mid-test.
#[derive(Debug, Default)]
pub struct PuppetFailureDetector {
    unreachable: Mutex<std::collections::HashSet<UniqueAddress>>,
}

impl PuppetFailureDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_unreachable(&self, ua: UniqueAddress) {
        self.unreachable.lock().unwrap().insert(ua);
    }

    pub fn mark_reachable(&self, ua: &UniqueAddress) {
        self.unreachable.lock().unwrap().remove(ua);
    }

    pub fn is_reachable(&self, ua: &UniqueAddress) -> bool {
        !self.unreachable.lock().unwrap().contains(ua)
    }
}

impl FailureDetectorBackend for PuppetFailureDetector {
    fn record_heartbeat(&self, _ua: UniqueAddress, _sequence: u64) {}

    fn forget(&self, ua: &UniqueAddress) {
        self.mark_reachable(ua);
    }

    fn is_reachable(&self, ua: &UniqueAddress, _now: Instant) -> bool {
        PuppetFailureDetector::is_reachable(self, ua)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use tokio::time::sleep;

    fn ua(host: &str) -> UniqueAddress {
        UniqueAddress::new(Address::new("council", "test", host, 9000), 1)
    }

    #[tokio::test]
    async fn failure_detector_member_stats() {
        let expected_mean = Duration::from_millis(5);
        let mut member = FailureDetectorMember::new(1);

        sleep(expected_mean).await;
        member.record_heartbeat(2);
        sleep(expected_mean * 3).await;
        member.record_heartbeat(5);
        sleep(expected_mean * 10).await;
        member.record_heartbeat(15);
        sleep(expected_mean * 5).await;
        member.record_heartbeat(20);

        let mean = member.heartbeats_intervals_mean.expect("mean should be computed");
        let min = expected_mean.mul_f64(0.5);
        let max = expected_mean.mul_f64(2.0);
        assert!(mean >= min && mean <= max, "mean {mean:?} out of [{min:?}, {max:?}]");
    }

    #[test]
    fn unknown_member_is_assumed_reachable() {
        let fd = FailureDetector::new(ua("self"), 8.0);
        assert!(fd.is_reachable(&ua("stranger"), Instant::now()));
    }

    #[test]
    fn puppet_failure_detector_tracks_explicit_marks() {
        let fd = PuppetFailureDetector::new();
        let node = ua("a");
        assert!(fd.is_reachable(&node));
        fd.mark_unreachable(node.clone());
        assert!(!fd.is_reachable(&node));
        fd.mark_reachable(&node);
        assert!(fd.is_reachable(&node));
    }
}
