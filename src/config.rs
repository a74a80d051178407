//! [`ClusterSettings`]: the configuration surface from spec §6.

use std::time::Duration;

use crate::app_version::AppVersion;

/// Default number of `Joining` members a leader tick will promote to
/// `WeaklyUp` in one pass, when `allow_weakly_up_members` is set.
pub const DEFAULT_WEAKLY_UP_BATCH_LIMIT: usize = 1;

/// Static configuration for one node's participation in the cluster.
/// Built via [`crate::builder::CouncilBuilder`]; immutable once the
/// coordinator starts.
#[derive(Debug, Clone)]
pub struct ClusterSettings {
    /// Roles this node advertises, including its mandatory `dc-`-prefixed
    /// datacenter role.
    pub roles: Vec<String>,
    /// The running application's version, gossiped alongside membership.
    pub app_version: AppVersion,
    /// When `Some(d)`, a `Joining` member unreachable-tolerant for at
    /// least `d` since joining may be promoted to `WeaklyUp` during a
    /// partition, instead of blocking on full convergence. `None`
    /// disables `WeaklyUp` promotion entirely.
    pub allow_weakly_up_members: Option<Duration>,
    /// How many members a single leader tick promotes to `WeaklyUp` at
    /// once.
    pub weakly_up_batch_limit: usize,
    /// How long a tombstone is retained before [`crate::cluster::Cluster`]
    /// prunes it. The merger itself never expires a tombstone on its own
    /// (spec §4.4) — this bounds how long a dead member's address is
    /// protected from revival before it's forgotten for good.
    pub tombstone_ttl: Duration,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            roles: vec![format!("dc-{}", crate::member::DEFAULT_DATACENTER)],
            app_version: AppVersion::default(),
            allow_weakly_up_members: None,
            weakly_up_batch_limit: DEFAULT_WEAKLY_UP_BATCH_LIMIT,
            tombstone_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}
