//! Age order and leader order over [`Member`]s (spec §4.1).
//!
//! `compare_member` (identity order) lives in `member.rs` alongside the
//! type it orders; the two orderings that need extra context — age
//! (datacenter-scoped) and leader-priority (status-bucketed) — live here.

use std::cmp::Ordering;

use crate::address::compare_address;
use crate::error::CrossDatacenterAgeCompare;
use crate::member::{compare_member, Member};
use crate::status::MemberStatus;

/// `a` is older than `b` iff they share a datacenter and either `a` has a
/// lower `up_number`, or equal `up_number` and a lower address. Fails with
/// [`CrossDatacenterAgeCompare`] when the two members aren't in the same
/// datacenter — cross-DC age comparison is meaningless since `up_number`
/// counters are only unique within one DC.
pub fn age_order(a: &Member, b: &Member) -> Result<Ordering, CrossDatacenterAgeCompare> {
    if a.data_center() != b.data_center() {
        return Err(CrossDatacenterAgeCompare {
            a: a.data_center().to_string(),
            b: b.data_center().to_string(),
        });
    }
    Ok(a.up_number()
        .cmp(&b.up_number())
        .then_with(|| compare_address(&a.unique_address.address, &b.unique_address.address)))
}

/// Bucket used by [`leader_order`]: leader-eligible statuses sort first,
/// by identity order; the remaining statuses sort strictly after, in the
/// precedence `WeaklyUp < Joining < Exiting < Down` (i.e. `Down` is the
/// worst, sorting last).
fn leader_bucket(status: MemberStatus) -> u8 {
    match status {
        MemberStatus::WeaklyUp => 1,
        MemberStatus::Joining => 2,
        MemberStatus::Exiting => 3,
        MemberStatus::Down => 4,
        _ => 0,
    }
}

/// Same as `compare_member`, except that members in `Down`, `Exiting`,
/// `Joining`, `WeaklyUp` sort strictly after any member not in that status,
/// in that precedence. The minimum element under this order, restricted to
/// members in leader-eligible statuses, is the leader.
pub fn leader_order(a: &Member, b: &Member) -> Ordering {
    leader_bucket(a.status())
        .cmp(&leader_bucket(b.status()))
        .then_with(|| compare_member(a, b))
}
