//! Error kinds from spec §7.
//!
//! Three kinds are real, caller-visible errors (`InvalidTransition`,
//! `CrossDatacenterAgeCompare`, `MissingDatacenterRole`); the remaining
//! three (`TombstoneViolation`, `StaleReachability`, `DowningOnNonMember`)
//! are not represented as error values at all — per spec §7 they are
//! logged at debug and the caller proceeds unaware. Grep for
//! `log::debug!` in `cluster.rs` and `cluster/gossip_destinations.rs`
//! for those sites.

use thiserror::Error;

pub use crate::status::InvalidTransition;

/// Raised when a caller asks to compare the age of two members from
/// different datacenters. Cross-DC age comparison is meaningless because
/// `up_number` counters are only monotonic within one datacenter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot compare ages across datacenters ({a:?} vs {b:?})")]
pub struct CrossDatacenterAgeCompare {
    pub a: String,
    pub b: String,
}

/// Raised when a [`crate::member::Member`] is constructed without exactly
/// one role carrying the datacenter prefix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MissingDatacenterRole {
    #[error("member roles {roles:?} do not contain a datacenter role (prefix {prefix:?})")]
    None { roles: Vec<String>, prefix: &'static str },
    #[error("member roles {roles:?} contain more than one datacenter role (prefix {prefix:?})")]
    Multiple { roles: Vec<String>, prefix: &'static str },
}

/// Umbrella error type for the membership core's public, caller-visible
/// failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MembershipError {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error(transparent)]
    CrossDatacenterAgeCompare(#[from] CrossDatacenterAgeCompare),
    #[error(transparent)]
    MissingDatacenterRole(#[from] MissingDatacenterRole),
}
