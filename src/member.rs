//! [`Member`]: the record binding a [`UniqueAddress`] to status, roles,
//! up-number and application version.

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::address::{compare_unique_address, UniqueAddress};
use crate::app_version::AppVersion;
use crate::error::{InvalidTransition, MissingDatacenterRole};
use crate::status::{self, MemberStatus};

/// Role prefix that marks the (exactly one) datacenter role every member
/// must carry.
pub const DATACENTER_ROLE_PREFIX: &str = "dc-";

/// Default datacenter name, used by convention when no site-specific
/// datacenter is configured (i.e. the role `"dc-default"`).
pub const DEFAULT_DATACENTER: &str = "default";

/// Sentinel `up_number` meaning "not yet `Up`".
pub const NOT_YET_UP: i32 = i32::MAX;

/// A binding of identity to lifecycle state, roles, up-number and app
/// version. Equality and hashing depend only on `unique_address`: two
/// `Member` values with the same unique address but different statuses
/// are equal as set elements, which is exactly what lets the merger (§4.4)
/// replace one with the other inside a `HashSet`/`HashMap` keyed on
/// `Member` or `UniqueAddress`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Member {
    pub unique_address: UniqueAddress,
    up_number: i32,
    status: MemberStatus,
    roles: BTreeSet<String>,
    app_version: AppVersion,
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.unique_address == other.unique_address
    }
}

impl Eq for Member {}

impl Hash for Member {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.unique_address.hash(state);
    }
}

fn datacenter_role<'a>(roles: &'a BTreeSet<String>) -> Result<&'a str, MissingDatacenterRole> {
    let mut matches = roles
        .iter()
        .filter(|r| r.starts_with(DATACENTER_ROLE_PREFIX));
    let first = matches.next();
    match (first, matches.next()) {
        (None, _) => Err(MissingDatacenterRole::None {
            roles: roles.iter().cloned().collect(),
            prefix: DATACENTER_ROLE_PREFIX,
        }),
        (Some(_), Some(_)) => Err(MissingDatacenterRole::Multiple {
            roles: roles.iter().cloned().collect(),
            prefix: DATACENTER_ROLE_PREFIX,
        }),
        (Some(role), None) => Ok(&role[DATACENTER_ROLE_PREFIX.len()..]),
    }
}

impl Member {
    /// Builds a member with status `Joining` and `up_number = NOT_YET_UP`.
    /// Rejects role sets that don't carry exactly one datacenter role.
    pub fn new_joining(
        unique_address: UniqueAddress,
        roles: impl IntoIterator<Item = String>,
        app_version: AppVersion,
    ) -> Result<Self, MissingDatacenterRole> {
        let roles: BTreeSet<String> = roles.into_iter().collect();
        datacenter_role(&roles)?;
        Ok(Self {
            unique_address,
            up_number: NOT_YET_UP,
            status: MemberStatus::Joining,
            roles,
            app_version,
        })
    }

    /// Promotes a `Joining` or `WeaklyUp` member to `Up`, assigning its
    /// `up_number`. Fails if the member isn't in one of those two statuses
    /// (it is the caller's job — the leader — to pick `n` so it's unique
    /// within the datacenter).
    pub fn promote_to_up(&self, n: i32) -> Result<Self, InvalidTransition> {
        let status = status::transition(self.status, MemberStatus::Up)?;
        Ok(Self {
            up_number: n,
            status,
            ..self.clone()
        })
    }

    /// Checked status transition; see the table in spec §3.
    pub fn with_status(&self, to: MemberStatus) -> Result<Self, InvalidTransition> {
        let status = status::transition(self.status, to)?;
        Ok(Self {
            status,
            ..self.clone()
        })
    }

    /// Reconstructs a member directly from its wire representation (spec
    /// §6's `{uniqueAddress, upNumber, status, roles, appVersion}` tuple).
    /// Unlike `new_joining`/`with_status`, this accepts any status: the
    /// transition that produced it already happened on the node that
    /// gossiped it, so there is nothing local to check here beyond the
    /// datacenter-role invariant.
    pub fn from_wire(
        unique_address: UniqueAddress,
        up_number: i32,
        status: MemberStatus,
        roles: impl IntoIterator<Item = String>,
        app_version: AppVersion,
    ) -> Result<Self, MissingDatacenterRole> {
        let roles: BTreeSet<String> = roles.into_iter().collect();
        datacenter_role(&roles)?;
        Ok(Self {
            unique_address,
            up_number,
            status,
            roles,
            app_version,
        })
    }

    pub fn address(&self) -> &UniqueAddress {
        &self.unique_address
    }

    /// The datacenter this member belongs to, derived from its one
    /// `dc-`-prefixed role. Infallible because construction already
    /// validated the invariant.
    pub fn data_center(&self) -> &str {
        datacenter_role(&self.roles).expect("Member invariant: exactly one datacenter role")
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    pub fn status(&self) -> MemberStatus {
        self.status
    }

    pub fn up_number(&self) -> i32 {
        self.up_number
    }

    pub fn app_version(&self) -> &AppVersion {
        &self.app_version
    }
}

/// Canonical member order: identity order, ignoring status/roles/version.
pub fn compare_member(a: &Member, b: &Member) -> std::cmp::Ordering {
    compare_unique_address(&a.unique_address, &b.unique_address)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::address::Address;

    pub fn member(host: &str, port: u16, uid: i64, dc: &str, status: MemberStatus) -> Member {
        member_raw(host, port, uid, dc, status, NOT_YET_UP)
    }

    /// Builds a member with both an arbitrary status and an arbitrary
    /// up_number directly, bypassing the transition table. Used by
    /// property tests that need to generate any `Member` value the merger
    /// might receive off the wire, not just ones reachable through a
    /// legal local transition sequence.
    pub fn member_raw(
        host: &str,
        port: u16,
        uid: i64,
        dc: &str,
        status: MemberStatus,
        up_number: i32,
    ) -> Member {
        let ua = UniqueAddress::new(Address::new("council", "test", host, port), uid);
        Member::from_wire(ua, up_number, status, vec![format!("dc-{dc}")], AppVersion::default()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::member;
    use super::*;
    use crate::address::Address;

    #[test]
    fn new_joining_requires_exactly_one_datacenter_role() {
        let ua = UniqueAddress::new(Address::new("council", "test", "a", 1), 1);
        assert!(Member::new_joining(ua.clone(), vec![], AppVersion::default()).is_err());
        assert!(Member::new_joining(
            ua.clone(),
            vec!["dc-east".to_string(), "dc-west".to_string()],
            AppVersion::default()
        )
        .is_err());
        assert!(Member::new_joining(ua, vec!["dc-east".to_string()], AppVersion::default()).is_ok());
    }

    #[test]
    fn data_center_strips_the_prefix() {
        let m = member("a", 1, 1, "east", MemberStatus::Joining);
        assert_eq!(m.data_center(), "east");
    }

    #[test]
    fn equality_and_hash_depend_only_on_unique_address() {
        let a = member("a", 1, 1, "east", MemberStatus::Joining);
        let mut b = a.clone();
        b.status = MemberStatus::Up;
        assert_eq!(a, b);

        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b), "differently-statused member with same ua should not be newly inserted");
    }

    #[test]
    fn promote_to_up_requires_joining_or_weakly_up() {
        let joining = member("a", 1, 1, "east", MemberStatus::Joining);
        let promoted = joining.promote_to_up(3).unwrap();
        assert_eq!(promoted.status(), MemberStatus::Up);
        assert_eq!(promoted.up_number(), 3);

        let up = member("a", 1, 1, "east", MemberStatus::Up);
        assert!(up.promote_to_up(4).is_err());
    }
}
