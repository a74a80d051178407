//! The membership coordinator: [`Cluster`] folds gossip, reachability
//! signals and leader ticks into the convergent state from spec §5/§6.
//!
//! Unlike the pure functions in `merge.rs`/`ordering.rs`, this struct is
//! stateful and is meant to be driven serially by a single task (see
//! [`crate::Council::main_thread`]) — none of its methods take `&self`
//! concurrently with a mutating call elsewhere.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use url::Url;

pub use self::gossip_destinations::GossipDestination;
use self::downing::{DowningPolicy, ReachabilityView};
use self::failure_detector::FailureDetectorBackend;
use crate::address::{compare_address, UniqueAddress};
use crate::config::ClusterSettings;
use crate::error::MissingDatacenterRole;
use crate::member::{compare_member, Member};
use crate::merge::{pick_highest_priority, MemberSet, Tombstones};
use crate::ordering::{age_order, leader_order};
use crate::status::MemberStatus;

pub mod downing;
pub mod failure_detector;

mod gossip_destinations;

/// Statuses that may block convergence while unreachable (spec §4.5).
/// `WeaklyUp` is deliberately excluded: the whole point of that status is
/// to let a member participate during a partition without stalling the
/// rest of the cluster.
const CONVERGENCE_BLOCKING_STATUSES: [MemberStatus; 3] =
    [MemberStatus::Joining, MemberStatus::Up, MemberStatus::Leaving];

/// Statuses eligible to hold cluster leadership (spec §4.1's leader
/// order: the minimum member under `leader_order` among these).
const LEADER_ELIGIBLE_STATUSES: [MemberStatus; 4] = [
    MemberStatus::Up,
    MemberStatus::Leaving,
    MemberStatus::PreparingForShutdown,
    MemberStatus::ReadyForShutdown,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reachability {
    Reachable,
    Unreachable,
}

/// Everything an observer outside the coordinator might want to react to.
/// Emitted by the methods below in the order the underlying state changed.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterEvent {
    MemberJoined(Member),
    MemberWeaklyUp(Member),
    MemberUp(Member),
    LeaderChanged {
        data_center: String,
        leader: Option<UniqueAddress>,
    },
    MemberLeft(Member),
    MemberExited(Member),
    MemberDowned(Member),
    MemberRemoved(Member),
    UnreachableMember(UniqueAddress),
    ReachableMember(UniqueAddress),
}

pub struct Cluster {
    pub(crate) this_unique_address: UniqueAddress,
    pub(crate) this_advertised_url: Url,
    pub(crate) unknown_peer_nodes: HashSet<Url>,
    pub(crate) members: MemberSet,
    pub(crate) tombstones: Tombstones,
    reachability: HashMap<UniqueAddress, Reachability>,
    unreachable_since: HashMap<UniqueAddress, Instant>,
    join_sequence: HashMap<UniqueAddress, u64>,
    next_join_sequence: u64,
    joined_at: HashMap<UniqueAddress, Instant>,
    next_up_number: HashMap<String, i32>,
    settings: ClusterSettings,
    downing_policy: Arc<dyn DowningPolicy>,
    failure_detector: Arc<dyn FailureDetectorBackend>,
}

impl Cluster {
    pub(crate) fn new(
        this_unique_address: UniqueAddress,
        this_advertised_url: Url,
        peer_nodes: HashSet<Url>,
        settings: ClusterSettings,
        downing_policy: Arc<dyn DowningPolicy>,
        failure_detector: Arc<dyn FailureDetectorBackend>,
    ) -> Result<Self, MissingDatacenterRole> {
        let self_member = Member::new_joining(
            this_unique_address.clone(),
            settings.roles.clone(),
            settings.app_version.clone(),
        )?;
        let mut members = MemberSet::new();
        members.insert(self_member);

        let mut join_sequence = HashMap::new();
        join_sequence.insert(this_unique_address.clone(), 0);
        let mut joined_at = HashMap::new();
        joined_at.insert(this_unique_address.clone(), Instant::now());

        Ok(Self {
            this_unique_address: this_unique_address.clone(),
            this_advertised_url,
            unknown_peer_nodes: peer_nodes,
            members,
            tombstones: Tombstones::new(),
            reachability: HashMap::new(),
            unreachable_since: HashMap::new(),
            join_sequence,
            next_join_sequence: 1,
            joined_at,
            next_up_number: HashMap::new(),
            settings,
            downing_policy,
            failure_detector,
        })
    }

    // ---- inbound: gossip ----

    /// Merges a remote gossip snapshot (spec §4.4/§6's `{senderUA, members,
    /// tombstones}` contract) into local state, returning the events that
    /// resulted.
    pub fn observe_gossip(
        &mut self,
        _sender: UniqueAddress,
        remote_members: MemberSet,
        remote_tombstones: Tombstones,
    ) -> Vec<ClusterEvent> {
        for (ua, recorded_at) in remote_tombstones {
            self.tombstones.entry(ua).or_insert(recorded_at);
        }
        self.prune_tombstones(SystemTime::now());

        let before = self.members.clone();
        self.members = pick_highest_priority(&self.members, &remote_members, &self.tombstones);
        self.forget_tombstoned();
        self.track_new_members();

        self.diff_events(&before)
    }

    /// Drops tombstones older than `settings.tombstone_ttl`. A member whose
    /// tombstone expires this way is only safe to revive because every
    /// peer's own copy of the tombstone expires on roughly the same
    /// schedule (spec §4.4 never reuses a `UniqueAddress`'s uid, so a
    /// pruned tombstone can't be mistaken for a still-live member).
    fn prune_tombstones(&mut self, now: SystemTime) {
        self.tombstones.retain(|_, recorded_at| {
            now.duration_since(*recorded_at).unwrap_or(std::time::Duration::ZERO) < self.settings.tombstone_ttl
        });
    }

    fn forget_tombstoned(&mut self) {
        for ua in self.tombstones.keys() {
            self.failure_detector.forget(ua);
            self.reachability.remove(ua);
            self.unreachable_since.remove(ua);
            self.join_sequence.remove(ua);
            self.joined_at.remove(ua);
        }
    }

    fn track_new_members(&mut self) {
        for m in &self.members {
            self.join_sequence.entry(m.unique_address.clone()).or_insert_with(|| {
                let n = self.next_join_sequence;
                self.next_join_sequence += 1;
                n
            });
            self.joined_at
                .entry(m.unique_address.clone())
                .or_insert_with(Instant::now);
        }
    }

    fn diff_events(&self, before: &MemberSet) -> Vec<ClusterEvent> {
        let before_by_address: HashMap<&UniqueAddress, &Member> =
            before.iter().map(|m| (&m.unique_address, m)).collect();
        let after_by_address: HashMap<&UniqueAddress, &Member> =
            self.members.iter().map(|m| (&m.unique_address, m)).collect();

        let mut events = Vec::new();
        for m in &self.members {
            match before_by_address.get(&m.unique_address) {
                None => {
                    if let Some(event) = new_member_event(m) {
                        events.push(event);
                    }
                }
                Some(old) if old.status() != m.status() => {
                    if let Some(event) = transition_event(m) {
                        events.push(event);
                    }
                }
                _ => {}
            }
        }
        for m in before {
            if !after_by_address.contains_key(&m.unique_address) {
                events.push(ClusterEvent::MemberRemoved(m.clone()));
            }
        }
        events
    }

    // ---- inbound: reachability ----

    /// Records an explicit reachability signal for `ua` (spec §6: this is
    /// how the failure detector's boolean output, or a puppet detector in
    /// tests, reaches the coordinator). A signal about an address that
    /// isn't a current member is a no-op, logged at debug level — stale
    /// reachability reports are expected whenever a member is removed
    /// while a heartbeat is in flight.
    pub fn observe_reachability(&mut self, ua: UniqueAddress, reachable: bool) -> Vec<ClusterEvent> {
        if !self.members.iter().any(|m| m.unique_address == ua) {
            log::debug!("[{}] reachability report for unknown member {ua}", self.this_unique_address);
            return Vec::new();
        }

        let was_reachable = !matches!(self.reachability.get(&ua), Some(Reachability::Unreachable));

        if reachable {
            self.reachability.insert(ua.clone(), Reachability::Reachable);
            self.unreachable_since.remove(&ua);
            if was_reachable {
                Vec::new()
            } else {
                vec![ClusterEvent::ReachableMember(ua)]
            }
        } else {
            self.reachability.insert(ua.clone(), Reachability::Unreachable);
            self.unreachable_since.entry(ua.clone()).or_insert_with(Instant::now);
            if was_reachable {
                vec![ClusterEvent::UnreachableMember(ua)]
            } else {
                Vec::new()
            }
        }
    }

    pub fn mark_node_as_unavailable(&mut self, ua: UniqueAddress) -> Vec<ClusterEvent> {
        self.observe_reachability(ua, false)
    }

    pub fn mark_node_as_available(&mut self, ua: UniqueAddress) -> Vec<ClusterEvent> {
        self.observe_reachability(ua, true)
    }

    // ---- inbound: downing ----

    /// Declares `ua` `Down`. A no-op (logged at debug level, spec §7's
    /// `DowningOnNonMember`) when `ua` isn't a current member, is already
    /// `Down`/`Removed`, or can't legally reach `Down` from its current
    /// status.
    pub fn apply_downing(&mut self, ua: &UniqueAddress) -> Vec<ClusterEvent> {
        let Some(member) = self.members.iter().find(|m| &m.unique_address == ua).cloned() else {
            log::debug!("[{}] downing requested for unknown member {ua}", self.this_unique_address);
            return Vec::new();
        };
        if matches!(member.status(), MemberStatus::Down | MemberStatus::Removed) {
            return Vec::new();
        }
        match member.with_status(MemberStatus::Down) {
            Ok(downed) => {
                self.members.remove(&member);
                self.members.insert(downed.clone());
                vec![ClusterEvent::MemberDowned(downed)]
            }
            Err(err) => {
                log::debug!("[{}] downing rejected: {err}", self.this_unique_address);
                Vec::new()
            }
        }
    }

    // ---- outbound queries ----

    pub fn members(&self) -> &MemberSet {
        &self.members
    }

    pub fn tombstones(&self) -> &Tombstones {
        &self.tombstones
    }

    /// The member eligible for leadership of `data_center` with the
    /// lowest [`leader_order`], or `None` if the datacenter has no
    /// leader-eligible member.
    pub fn leader(&self, data_center: &str) -> Option<UniqueAddress> {
        self.members
            .iter()
            .filter(|m| m.data_center() == data_center && LEADER_ELIGIBLE_STATUSES.contains(&m.status()))
            .min_by(|a, b| leader_order(a, b))
            .map(|m| m.unique_address.clone())
    }

    /// The oldest non-downed, non-removed member of `data_center` by
    /// [`age_order`].
    pub fn oldest(&self, data_center: &str) -> Option<UniqueAddress> {
        self.members
            .iter()
            .filter(|m| {
                m.data_center() == data_center
                    && !matches!(m.status(), MemberStatus::Down | MemberStatus::Removed)
            })
            .min_by(|a, b| age_order(a, b).expect("filtered to a single datacenter above"))
            .map(|m| m.unique_address.clone())
    }

    pub fn unreachable(&self) -> HashSet<UniqueAddress> {
        self.reachability
            .iter()
            .filter(|(_, r)| matches!(r, Reachability::Unreachable))
            .map(|(ua, _)| ua.clone())
            .collect()
    }

    fn is_unreachable(&self, ua: &UniqueAddress) -> bool {
        matches!(self.reachability.get(ua), Some(Reachability::Unreachable))
    }

    /// Whether every member in a convergence-blocking status (spec §4.5)
    /// is currently reachable — the gate that lets a leader move members
    /// from `Leaving` to `Exiting` and on to removal.
    pub fn is_convergence_possible(&self) -> bool {
        !self
            .members
            .iter()
            .any(|m| CONVERGENCE_BLOCKING_STATUSES.contains(&m.status()) && self.is_unreachable(&m.unique_address))
    }

    // ---- leader ticks ----

    /// Whether this node should act as leader of `data_center` on this
    /// tick: either it already holds leadership under [`Cluster::leader`],
    /// or — when no member has reached a leader-eligible status yet in
    /// that datacenter — it is the numerically lowest member present,
    /// mirroring how a real cluster's first seed node admits itself.
    fn should_act_as_leader_of(&self, data_center: &str) -> bool {
        match self.leader(data_center) {
            Some(leader) => leader == self.this_unique_address,
            None => self
                .members
                .iter()
                .filter(|m| m.data_center() == data_center)
                .min_by(|a, b| compare_member(a, b))
                .map(|m| m.unique_address == self.this_unique_address)
                .unwrap_or(false),
        }
    }

    /// Runs one leader tick (spec §6): promotes `Joining`/`WeaklyUp`
    /// members, moves `Leaving` members through `Exiting` to removal once
    /// convergence allows it, and applies the configured downing policy.
    /// A no-op for any datacenter this node doesn't currently lead.
    pub fn leader_actions(&mut self, now: Instant) -> Vec<ClusterEvent> {
        let mut events = Vec::new();
        let mut data_centers: Vec<String> = self.members.iter().map(|m| m.data_center().to_string()).collect();
        data_centers.sort();
        data_centers.dedup();

        let mut led_any = false;
        for data_center in &data_centers {
            if !self.should_act_as_leader_of(data_center) {
                continue;
            }
            led_any = true;

            let old_leader = self.leader(data_center);
            events.extend(self.promote_joining_to_up(data_center));
            events.extend(self.promote_joining_to_weakly_up(data_center, now));
            if self.is_convergence_possible() {
                events.extend(self.promote_leaving_to_exiting(data_center));
                events.extend(self.remove_exited_and_downed(data_center));
            }
            let new_leader = self.leader(data_center);
            if old_leader != new_leader {
                events.push(ClusterEvent::LeaderChanged {
                    data_center: data_center.clone(),
                    leader: new_leader,
                });
            }
        }

        if led_any {
            let to_down = self
                .downing_policy
                .decide(now, &ReachabilityView { unreachable_since: &self.unreachable_since });
            for ua in to_down {
                events.extend(self.apply_downing(&ua));
            }
        }

        self.forget_tombstoned();
        events
    }

    /// Promotes every `Joining`/`WeaklyUp` member of `data_center` to `Up`
    /// once the whole cluster is reachable again — the same gate that
    /// blocks a fresh `Joining` member covers a `WeaklyUp` member catching
    /// up after its partition heals (spec §6's "leader promotes `N` to
    /// `Up`" once convergence is possible again).
    fn promote_joining_to_up(&mut self, data_center: &str) -> Vec<ClusterEvent> {
        if !self.is_fully_reachable() {
            return Vec::new();
        }
        let mut joining: Vec<Member> = self
            .members
            .iter()
            .filter(|m| {
                m.data_center() == data_center
                    && matches!(m.status(), MemberStatus::Joining | MemberStatus::WeaklyUp)
            })
            .cloned()
            .collect();
        joining.sort_by(|a, b| {
            self.join_sequence
                .get(&a.unique_address)
                .cmp(&self.join_sequence.get(&b.unique_address))
                .then_with(|| compare_address(&a.unique_address.address, &b.unique_address.address))
        });

        let mut events = Vec::new();
        for m in joining {
            let next = self.next_up_number.entry(data_center.to_string()).or_insert(0);
            *next += 1;
            let promoted = m.promote_to_up(*next).expect("Joining always promotes to Up");
            self.members.remove(&m);
            self.members.insert(promoted.clone());
            events.push(ClusterEvent::MemberUp(promoted));
        }
        events
    }

    fn promote_joining_to_weakly_up(&mut self, data_center: &str, now: Instant) -> Vec<ClusterEvent> {
        let Some(after) = self.settings.allow_weakly_up_members else {
            return Vec::new();
        };
        if self.is_fully_reachable() {
            return Vec::new();
        }

        let mut candidates: Vec<Member> = self
            .members
            .iter()
            .filter(|m| m.data_center() == data_center && m.status() == MemberStatus::Joining)
            .filter(|m| !self.is_unreachable(&m.unique_address))
            .filter(|m| {
                self.joined_at
                    .get(&m.unique_address)
                    .is_some_and(|joined| now.saturating_duration_since(*joined) >= after)
            })
            .cloned()
            .collect();
        candidates.sort_by(compare_member);
        candidates.truncate(self.settings.weakly_up_batch_limit);

        let mut events = Vec::new();
        for m in candidates {
            let promoted = m.with_status(MemberStatus::WeaklyUp).expect("Joining always allows WeaklyUp");
            self.members.remove(&m);
            self.members.insert(promoted.clone());
            events.push(ClusterEvent::MemberWeaklyUp(promoted));
        }
        events
    }

    fn promote_leaving_to_exiting(&mut self, data_center: &str) -> Vec<ClusterEvent> {
        let leaving: Vec<Member> = self
            .members
            .iter()
            .filter(|m| m.data_center() == data_center && m.status() == MemberStatus::Leaving)
            .cloned()
            .collect();

        let mut events = Vec::new();
        for m in leaving {
            let exiting = m.with_status(MemberStatus::Exiting).expect("Leaving always allows Exiting");
            self.members.remove(&m);
            self.members.insert(exiting.clone());
            events.push(ClusterEvent::MemberExited(exiting));
        }
        events
    }

    fn remove_exited_and_downed(&mut self, data_center: &str) -> Vec<ClusterEvent> {
        let removable: Vec<Member> = self
            .members
            .iter()
            .filter(|m| {
                m.data_center() == data_center && matches!(m.status(), MemberStatus::Exiting | MemberStatus::Down)
            })
            .cloned()
            .collect();

        let mut events = Vec::new();
        for m in removable {
            self.members.remove(&m);
            self.tombstones.insert(m.unique_address.clone(), SystemTime::now());
            let removed = m.with_status(MemberStatus::Removed).expect("Exiting/Down always allow Removed");
            events.push(ClusterEvent::MemberRemoved(removed));
        }
        events
    }

    fn is_fully_reachable(&self) -> bool {
        !self.members.iter().any(|m| self.is_unreachable(&m.unique_address))
    }

    // ---- failure detector plumbing ----

    pub fn record_heartbeat(&mut self, ua: UniqueAddress, sequence: u64) {
        self.failure_detector.record_heartbeat(ua, sequence);
    }

    /// Reconciles the failure detector's phi-derived verdicts into
    /// reachability state, returning any resulting
    /// `UnreachableMember`/`ReachableMember` events. Call on a timer
    /// independent of gossip/leader ticks.
    pub fn refresh_reachability(&mut self, now: Instant) -> Vec<ClusterEvent> {
        let addresses: Vec<UniqueAddress> = self.members.iter().map(|m| m.unique_address.clone()).collect();
        let mut events = Vec::new();
        for ua in addresses {
            if ua == self.this_unique_address {
                continue;
            }
            let reachable = self.failure_detector.is_reachable(&ua, now);
            events.extend(self.observe_reachability(ua, reachable));
        }
        events
    }
}

fn new_member_event(m: &Member) -> Option<ClusterEvent> {
    match m.status() {
        MemberStatus::Joining => Some(ClusterEvent::MemberJoined(m.clone())),
        MemberStatus::WeaklyUp => Some(ClusterEvent::MemberWeaklyUp(m.clone())),
        MemberStatus::Up => Some(ClusterEvent::MemberUp(m.clone())),
        _ => Some(ClusterEvent::MemberJoined(m.clone())),
    }
}

fn transition_event(m: &Member) -> Option<ClusterEvent> {
    match m.status() {
        MemberStatus::WeaklyUp => Some(ClusterEvent::MemberWeaklyUp(m.clone())),
        MemberStatus::Up => Some(ClusterEvent::MemberUp(m.clone())),
        MemberStatus::Leaving => Some(ClusterEvent::MemberLeft(m.clone())),
        MemberStatus::Exiting => Some(ClusterEvent::MemberExited(m.clone())),
        MemberStatus::Down => Some(ClusterEvent::MemberDowned(m.clone())),
        MemberStatus::Removed => Some(ClusterEvent::MemberRemoved(m.clone())),
        // PreparingForShutdown/ReadyForShutdown have no dedicated public
        // event; spec §6's observable-event list doesn't name one.
        MemberStatus::PreparingForShutdown | MemberStatus::ReadyForShutdown | MemberStatus::Joining => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::cluster::downing::{AutoDownUnreachableAfter, PuppetDowningPolicy};
    use crate::cluster::failure_detector::{FailureDetector, PuppetFailureDetector};
    use std::time::Duration;

    fn settings(dc: &str) -> ClusterSettings {
        ClusterSettings {
            roles: vec![format!("dc-{dc}")],
            ..ClusterSettings::default()
        }
    }

    fn cluster(host: &str, dc: &str) -> Cluster {
        let ua = UniqueAddress::new(Address::new("council", "test", host, 9000), 1);
        let url = Url::parse(&format!("council://test@{host}:9000")).unwrap();
        Cluster::new(
            ua.clone(),
            url,
            HashSet::new(),
            settings(dc),
            Arc::new(PuppetDowningPolicy::new()),
            Arc::new(FailureDetector::new(ua, 8.0)),
        )
        .unwrap()
    }

    /// S1 — a lone seed node admits itself to `Up` on the first leader tick.
    #[test]
    fn single_node_bootstraps_itself_to_up() {
        let mut c = cluster("a", "east");
        let events = c.leader_actions(Instant::now());
        assert!(events.iter().any(|e| matches!(e, ClusterEvent::MemberUp(m) if m.up_number() == 1)));
        assert_eq!(c.members().iter().next().unwrap().status(), MemberStatus::Up);
    }

    #[test]
    fn reachability_report_for_unknown_member_is_ignored() {
        let mut c = cluster("a", "east");
        let stranger = UniqueAddress::new(Address::new("council", "test", "z", 9000), 99);
        assert!(c.mark_node_as_unavailable(stranger).is_empty());
    }

    #[test]
    fn downing_unknown_member_is_a_no_op() {
        let mut c = cluster("a", "east");
        let stranger = UniqueAddress::new(Address::new("council", "test", "z", 9000), 99);
        assert!(c.apply_downing(&stranger).is_empty());
    }

    #[test]
    fn is_convergence_possible_ignores_unreachable_weakly_up_members() {
        let mut c = cluster("a", "east");
        let peer = UniqueAddress::new(Address::new("council", "test", "b", 9000), 2);
        let weakly_up = Member::new_joining(peer.clone(), vec!["dc-east".to_string()], Default::default())
            .unwrap()
            .with_status(MemberStatus::WeaklyUp)
            .unwrap();
        c.members.insert(weakly_up);
        c.reachability.insert(peer, Reachability::Unreachable);
        assert!(c.is_convergence_possible());
    }

    #[test]
    fn is_convergence_possible_blocks_on_unreachable_leaving_member() {
        let mut c = cluster("a", "east");
        let peer = UniqueAddress::new(Address::new("council", "test", "b", 9000), 2);
        let leaving = Member::new_joining(peer.clone(), vec!["dc-east".to_string()], Default::default())
            .unwrap()
            .promote_to_up(1)
            .unwrap()
            .with_status(MemberStatus::Leaving)
            .unwrap();
        c.members.insert(leaving);
        c.reachability.insert(peer, Reachability::Unreachable);
        assert!(!c.is_convergence_possible());
    }

    fn cluster_with(host: &str, dc: &str, downing_policy: Arc<dyn DowningPolicy>) -> Cluster {
        let ua = UniqueAddress::new(Address::new("council", "test", host, 9000), 1);
        let url = Url::parse(&format!("council://test@{host}:9000")).unwrap();
        Cluster::new(
            ua,
            url,
            HashSet::new(),
            settings(dc),
            downing_policy,
            Arc::new(PuppetFailureDetector::new()),
        )
        .unwrap()
    }

    fn up_member(host: &str, uid: i64, dc: &str, up_number: i32) -> Member {
        let ua = UniqueAddress::new(Address::new("council", "test", host, 9000), uid);
        Member::new_joining(ua, vec![format!("dc-{dc}")], Default::default())
            .unwrap()
            .promote_to_up(up_number)
            .unwrap()
    }

    /// S5 — a member that joins during a partition is promoted to
    /// `WeaklyUp` once it's waited out `allow_weakly_up_members`, and to
    /// `Up` once the partition heals.
    #[tokio::test(start_paused = true)]
    async fn weakly_up_member_is_promoted_to_up_once_partition_heals_s5() {
        let mut c = cluster_with("a", "east", Arc::new(PuppetDowningPolicy::new()));
        c.settings.allow_weakly_up_members = Some(Duration::from_secs(3));

        // Bootstrap self to `Up` (S1) before the partition starts.
        c.leader_actions(tokio::time::Instant::now().into_std());

        // The other side of a 2/3 split: unreachable from here.
        let peer = UniqueAddress::new(Address::new("council", "test", "b", 9000), 2);
        c.members.insert(up_member("b", 2, "east", 2));
        c.reachability.insert(peer, Reachability::Unreachable);

        // N joins this side of the partition.
        let n = UniqueAddress::new(Address::new("council", "test", "n", 9000), 3);
        let n_member = Member::new_joining(n.clone(), vec!["dc-east".to_string()], Default::default()).unwrap();
        c.members.insert(n_member);
        c.joined_at.insert(n.clone(), tokio::time::Instant::now().into_std());

        let events = c.leader_actions(tokio::time::Instant::now().into_std());
        assert!(!events.iter().any(|e| matches!(e, ClusterEvent::MemberWeaklyUp(_))));

        tokio::time::advance(Duration::from_secs(3)).await;
        let events = c.leader_actions(tokio::time::Instant::now().into_std());
        assert!(events.iter().any(|e| matches!(e, ClusterEvent::MemberWeaklyUp(m) if m.unique_address == n)));
        assert!(c.is_convergence_possible(), "WeaklyUp must not block convergence");
        assert_eq!(
            c.members().iter().find(|m| m.unique_address == n).unwrap().status(),
            MemberStatus::WeaklyUp
        );

        // Partition heals.
        c.reachability.insert(UniqueAddress::new(Address::new("council", "test", "b", 9000), 2), Reachability::Reachable);
        let events = c.leader_actions(tokio::time::Instant::now().into_std());
        assert!(events.iter().any(|e| matches!(e, ClusterEvent::MemberUp(m) if m.unique_address == n)));
        assert_eq!(
            c.members().iter().find(|m| m.unique_address == n).unwrap().status(),
            MemberStatus::Up
        );
    }

    /// S6 — a member that stays unreachable past `auto_down_unreachable_after`
    /// is downed by the policy, then advanced to `Removed` and tombstoned
    /// by the leader on a later tick.
    #[tokio::test(start_paused = true)]
    async fn auto_downs_unreachable_member_then_removes_it_s6() {
        let mut c = cluster_with(
            "a",
            "east",
            Arc::new(AutoDownUnreachableAfter::new(Duration::from_secs(5))),
        );

        // Bootstrap self to `Up` (S1) before the other members join.
        c.leader_actions(tokio::time::Instant::now().into_std());
        c.members.insert(up_member("b", 2, "east", 2));
        c.members.insert(up_member("c", 3, "east", 3));
        let d = UniqueAddress::new(Address::new("council", "test", "d", 9000), 4);
        c.members.insert(up_member("d", 4, "east", 4));

        let events = c.observe_reachability(d.clone(), false);
        assert!(events.iter().any(|e| matches!(e, ClusterEvent::UnreachableMember(ua) if *ua == d)));

        let events = c.leader_actions(tokio::time::Instant::now().into_std());
        assert!(!events.iter().any(|e| matches!(e, ClusterEvent::MemberDowned(_))));
        assert_eq!(c.members().len(), 4);

        tokio::time::advance(Duration::from_secs(5)).await;
        let events = c.leader_actions(tokio::time::Instant::now().into_std());
        assert!(events.iter().any(|e| matches!(e, ClusterEvent::MemberDowned(m) if m.unique_address == d)));

        let events = c.leader_actions(tokio::time::Instant::now().into_std());
        assert!(events.iter().any(|e| matches!(e, ClusterEvent::MemberRemoved(m) if m.unique_address == d)));
        assert_eq!(c.members().len(), 3);
        assert!(c.tombstones().contains_key(&d));
    }
}
