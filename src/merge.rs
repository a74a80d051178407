//! The view merger: `pick_highest_priority`, the pure function that
//! reconciles two gossiped member sets into one (spec §4.4).
//!
//! This is the piece that makes gossip convergent: given the same
//! tombstone map, the function is associative and commutative, so no
//! matter what order or topology gossip exchanges happen in, every node
//! eventually computes the same member set.

use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use crate::member::Member;
use crate::ordering::age_order;
use crate::address::UniqueAddress;
use crate::status::MemberStatus;

pub type MemberSet = HashSet<Member>;
pub type Tombstones = HashMap<UniqueAddress, SystemTime>;

/// Total precedence used when two sides report the *same* address with
/// *different* statuses: lower rank wins. Mirrors the list in spec §4.4
/// exactly (`Removed` highest priority, `Joining` lowest); see
/// `DESIGN.md` for why `PreparingForShutdown`/`ReadyForShutdown` sit where
/// they do.
fn priority_rank(status: MemberStatus) -> u8 {
    use MemberStatus::*;
    match status {
        Removed => 0,
        ReadyForShutdown => 1,
        Down => 2,
        Exiting => 3,
        Leaving => 4,
        PreparingForShutdown => 5,
        Up => 6,
        WeaklyUp => 7,
        Joining => 8,
    }
}

/// Folds two views of the *same* member (same `unique_address`) into one.
/// When both sides agree on status, keeps the older member (by
/// [`age_order`]) to preserve stable up-numbers; otherwise advances by
/// [`priority_rank`]. Symmetric in `m1`/`m2` so the merger as a whole stays
/// commutative.
fn highest_priority_of(m1: &Member, m2: &Member) -> Member {
    if m1.status() == m2.status() {
        match age_order(m1, m2) {
            Ok(std::cmp::Ordering::Greater) => m2.clone(),
            _ => m1.clone(),
        }
    } else {
        let r1 = priority_rank(m1.status());
        let r2 = priority_rank(m2.status());
        if r1 <= r2 {
            m1.clone()
        } else {
            m2.clone()
        }
    }
}

/// Reconciles `a` and `b` into one set: groups the union by
/// `unique_address`, drops any address present in `tombstones`, and
/// otherwise folds the group with [`highest_priority_of`] — a single-sided
/// member is kept as-is, since `None` (the address absent from a side) must
/// act as the fold's identity element for the combine to stay associative.
///
/// Revival of a `Down`/`Exiting` member a peer has already forgotten is
/// prevented by the tombstone check above, not by this fold: every node
/// that drops such a member from its own set does so by tombstoning it in
/// the same step ([`crate::cluster::Cluster::remove_exited_and_downed`]),
/// so by the time any two sides are merged, `tombstones` already carries
/// the fully-accumulated global knowledge needed to reject it — unlike a
/// pairwise single-sided-drop rule, which only ever sees two of the inputs
/// at a time and therefore can't be made associative.
pub fn pick_highest_priority(a: &MemberSet, b: &MemberSet, tombstones: &Tombstones) -> MemberSet {
    let mut grouped: HashMap<&UniqueAddress, (Option<&Member>, Option<&Member>)> = HashMap::new();
    for m in a {
        grouped.entry(&m.unique_address).or_insert((None, None)).0 = Some(m);
    }
    for m in b {
        grouped.entry(&m.unique_address).or_insert((None, None)).1 = Some(m);
    }

    let mut result = MemberSet::new();
    for (ua, (oa, ob)) in grouped {
        if tombstones.contains_key(ua) {
            continue;
        }
        match (oa, ob) {
            (Some(m), None) | (None, Some(m)) => {
                result.insert(m.clone());
            }
            (Some(ma), Some(mb)) => {
                result.insert(highest_priority_of(ma, mb));
            }
            (None, None) => unreachable!("group with no members on either side"),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::app_version::AppVersion;
    use crate::member::test_support::{member, member_raw};
    use quickcheck::{Arbitrary, Gen};
    use std::collections::HashMap as Map;
    use MemberStatus::*;

    fn set(members: Vec<Member>) -> MemberSet {
        members.into_iter().collect()
    }

    fn ua(host: &str, uid: i64) -> UniqueAddress {
        UniqueAddress::new(Address::new("council", "test", host, 9000), uid)
    }

    fn m(host: &str, uid: i64, up: i32, status: MemberStatus) -> Member {
        member_raw(host, 9000, uid, "east", status, up)
    }

    /// S2 — merge chooses the further-along state when statuses differ.
    #[test]
    fn merge_chooses_further_state() {
        let x_up = member("x", 9000, 1, "east", Joining).promote_to_up(1).unwrap();
        let x_leaving = x_up.with_status(Leaving).unwrap();

        let a = set(vec![x_up.clone()]);
        let b = set(vec![x_leaving.clone()]);

        let merged = pick_highest_priority(&a, &b, &Tombstones::new());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.iter().next().unwrap().status(), Leaving);
    }

    /// S3 — equal statuses keep the older member (lower up_number).
    #[test]
    fn merge_keeps_the_older_member_on_status_tie() {
        let older = member("x", 9000, 1, "east", Joining).promote_to_up(1).unwrap();
        let younger = member("x", 9000, 1, "east", Joining).promote_to_up(2).unwrap();

        let a = set(vec![older.clone()]);
        let b = set(vec![younger]);

        let merged = pick_highest_priority(&a, &b, &Tombstones::new());
        assert_eq!(merged.iter().next().unwrap().up_number(), 1);
    }

    /// S4 — tombstone wins over anything still claiming to be alive.
    #[test]
    fn tombstone_drops_the_member_from_the_merged_set() {
        let x = member("x", 9000, 1, "east", Up);
        let a = set(vec![x.clone()]);
        let b = MemberSet::new();
        let mut tombstones = Tombstones::new();
        tombstones.insert(x.unique_address.clone(), SystemTime::now());

        let merged = pick_highest_priority(&a, &b, &tombstones);
        assert!(merged.is_empty());
    }

    /// A single-sided `Down`/`Exiting` member is kept unless a tombstone
    /// says otherwise — dropping it unconditionally would break
    /// associativity (see `pick_highest_priority`'s doc comment).
    #[test]
    fn single_sided_down_or_exiting_member_is_kept_absent_a_tombstone() {
        let down = member("x", 9000, 1, "east", Down);
        let a = set(vec![down]);
        let b = MemberSet::new();

        let merged = pick_highest_priority(&a, &b, &Tombstones::new());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.iter().next().unwrap().status(), Down);
    }

    #[test]
    fn single_sided_down_member_is_dropped_once_tombstoned() {
        let down = member("x", 9000, 1, "east", Down);
        let a = set(vec![down.clone()]);
        let b = MemberSet::new();
        let mut tombstones = Tombstones::new();
        tombstones.insert(down.unique_address.clone(), SystemTime::now());

        let merged = pick_highest_priority(&a, &b, &tombstones);
        assert!(merged.is_empty());
    }

    #[test]
    fn single_sided_up_member_is_kept() {
        let up = member("x", 9000, 1, "east", Up);
        let a = set(vec![up.clone()]);
        let b = MemberSet::new();

        let merged = pick_highest_priority(&a, &b, &Tombstones::new());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.iter().next().unwrap().status(), Up);
    }

    // ---- algebraic properties (universal properties 2-4 of spec §8) ----
    //
    // Arbitrary inputs are drawn from a small, fixed alphabet of addresses
    // and statuses (mirroring the teacher's own `cluster_view_merge_is_*`
    // quickcheck tests), and all three sides of each property share one
    // tombstone map, per spec §4.4's "pure, associative, and commutative
    // on inputs that share a common tombstone map".

    #[derive(Clone, Debug)]
    struct SmallMember(Member);

    const ADDRS: [(&str, i64); 3] = [("x", 1), ("y", 2), ("z", 3)];
    const STATUSES: [MemberStatus; 9] = [
        Joining,
        WeaklyUp,
        Up,
        Leaving,
        Exiting,
        Down,
        Removed,
        PreparingForShutdown,
        ReadyForShutdown,
    ];

    impl Arbitrary for SmallMember {
        fn arbitrary(g: &mut Gen) -> Self {
            let (host, uid) = *g.choose(&ADDRS).unwrap();
            let status = *g.choose(&STATUSES).unwrap();
            let up = *g.choose(&[1i32, 2, 3]).unwrap();
            SmallMember(m(host, uid, up, status))
        }
    }

    #[derive(Clone, Debug)]
    struct SmallMemberSet(MemberSet);

    impl Arbitrary for SmallMemberSet {
        fn arbitrary(g: &mut Gen) -> Self {
            let n = *g.choose(&[0usize, 1, 2, 3]).unwrap();
            let members = (0..n)
                .map(|_| SmallMember::arbitrary(g).0)
                .collect::<MemberSet>();
            SmallMemberSet(members)
        }
    }

    fn shared_tombstones(g: &mut Gen) -> Tombstones {
        let mut t = Map::new();
        if bool::arbitrary(g) {
            let (host, uid) = *g.choose(&ADDRS).unwrap();
            t.insert(ua(host, uid), SystemTime::UNIX_EPOCH);
        }
        t
    }

    #[quickcheck]
    fn merge_is_idempotent(a: SmallMemberSet) -> bool {
        let mut g = Gen::new(10);
        let t = shared_tombstones(&mut g);
        let merged = pick_highest_priority(&a.0, &a.0, &t);
        let merged_again = pick_highest_priority(&merged, &merged, &t);
        merged == merged_again
    }

    #[quickcheck]
    fn merge_is_commutative(a: SmallMemberSet, b: SmallMemberSet) -> bool {
        let mut g = Gen::new(10);
        let t = shared_tombstones(&mut g);
        pick_highest_priority(&a.0, &b.0, &t) == pick_highest_priority(&b.0, &a.0, &t)
    }

    #[quickcheck]
    fn merge_is_associative(a: SmallMemberSet, b: SmallMemberSet, c: SmallMemberSet) -> bool {
        let mut g = Gen::new(10);
        let t = shared_tombstones(&mut g);
        let left = pick_highest_priority(&pick_highest_priority(&a.0, &b.0, &t), &c.0, &t);
        let right = pick_highest_priority(&a.0, &pick_highest_priority(&b.0, &c.0, &t), &t);
        left == right
    }
}
