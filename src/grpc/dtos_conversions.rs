//! Conversions between the wire DTOs generated from `proto/council.proto`
//! and the domain types in `address`/`member`/`status`/`merge`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::protos;
use crate::address::{Address, UniqueAddress};
use crate::app_version::AppVersion;
use crate::member::Member;
use crate::merge::{MemberSet, Tombstones};
use crate::status::MemberStatus;

impl From<&Address> for protos::Address {
    fn from(value: &Address) -> Self {
        protos::Address {
            protocol: value.protocol.clone(),
            system: value.system.clone(),
            host: value.host.clone().unwrap_or_default(),
            port: value.port.unwrap_or_default() as u32,
        }
    }
}

impl From<protos::Address> for Address {
    fn from(value: protos::Address) -> Self {
        Address {
            protocol: value.protocol,
            system: value.system,
            host: (!value.host.is_empty()).then_some(value.host),
            port: (value.port != 0).then_some(value.port as u16),
        }
    }
}

impl From<&UniqueAddress> for protos::UniqueAddress {
    fn from(value: &UniqueAddress) -> Self {
        protos::UniqueAddress {
            address: Some((&value.address).into()),
            uid: value.uid,
        }
    }
}

impl TryFrom<protos::UniqueAddress> for UniqueAddress {
    type Error = &'static str;

    fn try_from(value: protos::UniqueAddress) -> Result<Self, Self::Error> {
        let address = value.address.ok_or("UniqueAddress.address is required")?;
        Ok(UniqueAddress::new(address.into(), value.uid))
    }
}

fn status_to_wire(status: MemberStatus) -> protos::MemberStatus {
    match status {
        MemberStatus::Joining => protos::MemberStatus::Joining,
        MemberStatus::WeaklyUp => protos::MemberStatus::WeaklyUp,
        MemberStatus::Up => protos::MemberStatus::Up,
        MemberStatus::Leaving => protos::MemberStatus::Leaving,
        MemberStatus::Exiting => protos::MemberStatus::Exiting,
        MemberStatus::Down => protos::MemberStatus::Down,
        MemberStatus::Removed => protos::MemberStatus::Removed,
        MemberStatus::PreparingForShutdown => protos::MemberStatus::PreparingForShutdown,
        MemberStatus::ReadyForShutdown => protos::MemberStatus::ReadyForShutdown,
    }
}

fn status_from_wire(status: protos::MemberStatus) -> MemberStatus {
    match status {
        protos::MemberStatus::Joining => MemberStatus::Joining,
        protos::MemberStatus::WeaklyUp => MemberStatus::WeaklyUp,
        protos::MemberStatus::Up => MemberStatus::Up,
        protos::MemberStatus::Leaving => MemberStatus::Leaving,
        protos::MemberStatus::Exiting => MemberStatus::Exiting,
        protos::MemberStatus::Down => MemberStatus::Down,
        protos::MemberStatus::Removed => MemberStatus::Removed,
        protos::MemberStatus::PreparingForShutdown => MemberStatus::PreparingForShutdown,
        protos::MemberStatus::ReadyForShutdown => MemberStatus::ReadyForShutdown,
    }
}

impl From<&Member> for protos::Member {
    fn from(value: &Member) -> Self {
        protos::Member {
            unique_address: Some((&value.unique_address).into()),
            up_number: value.up_number(),
            status: status_to_wire(value.status()) as i32,
            roles: value.roles().map(str::to_string).collect(),
            app_version: value.app_version().to_string(),
        }
    }
}

/// Reconstructs a [`Member`] from the wire, rejecting entries missing the
/// mandatory datacenter role (spec §7) rather than defaulting them. Callers
/// drop the offending entry and log a warning instead of failing the whole
/// exchange over one malformed peer.
impl TryFrom<protos::Member> for Member {
    type Error = String;

    fn try_from(value: protos::Member) -> Result<Self, Self::Error> {
        let status = status_from_wire(value.status());
        let unique_address: UniqueAddress = value
            .unique_address
            .ok_or("Member.unique_address is required")?
            .try_into()
            .map_err(str::to_string)?;
        Member::from_wire(
            unique_address,
            value.up_number,
            status,
            value.roles,
            AppVersion::from(value.app_version),
        )
        .map_err(|e| e.to_string())
    }
}

impl From<(&UniqueAddress, &SystemTime)> for protos::TombstoneEntry {
    fn from((ua, at): (&UniqueAddress, &SystemTime)) -> Self {
        let millis = at
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        protos::TombstoneEntry {
            unique_address: Some(ua.into()),
            removed_at_millis: millis,
        }
    }
}

impl TryFrom<protos::TombstoneEntry> for (UniqueAddress, SystemTime) {
    type Error = &'static str;

    fn try_from(value: protos::TombstoneEntry) -> Result<Self, Self::Error> {
        let ua: UniqueAddress = value
            .unique_address
            .ok_or("TombstoneEntry.unique_address is required")?
            .try_into()?;
        let at = UNIX_EPOCH + Duration::from_millis(value.removed_at_millis);
        Ok((ua, at))
    }
}

/// Builds the outbound snapshot for one gossip round.
pub(crate) fn snapshot_to_wire(
    sender: &UniqueAddress,
    members: &MemberSet,
    tombstones: &Tombstones,
) -> protos::GossipSnapshot {
    protos::GossipSnapshot {
        sender: Some(sender.into()),
        members: members.iter().map(protos::Member::from).collect(),
        tombstones: tombstones.iter().map(protos::TombstoneEntry::from).collect(),
    }
}

/// Parses an inbound snapshot, skipping (with a warning) any member or
/// tombstone entry that fails to convert rather than rejecting the whole
/// exchange.
pub(crate) fn snapshot_from_wire(
    snapshot: protos::GossipSnapshot,
) -> (Option<UniqueAddress>, MemberSet, Tombstones) {
    let sender = snapshot.sender.and_then(|s| s.try_into().ok());

    let members = snapshot
        .members
        .into_iter()
        .filter_map(|m| match Member::try_from(m) {
            Ok(m) => Some(m),
            Err(e) => {
                log::warn!("dropping malformed gossiped member: {e}");
                None
            }
        })
        .collect();

    let tombstones = snapshot
        .tombstones
        .into_iter()
        .filter_map(|t| match <(UniqueAddress, SystemTime)>::try_from(t) {
            Ok(pair) => Some(pair),
            Err(e) => {
                log::warn!("dropping malformed tombstone entry: {e}");
                None
            }
        })
        .collect();

    (sender, members, tombstones)
}

impl From<(&UniqueAddress, u64)> for protos::HeartbeatEntry {
    fn from((ua, heartbeat): (&UniqueAddress, u64)) -> Self {
        protos::HeartbeatEntry {
            unique_address: Some(ua.into()),
            heartbeat,
        }
    }
}

pub(crate) fn heartbeats_to_wire(entries: &[(UniqueAddress, u64)]) -> protos::HeartbeatMessage {
    protos::HeartbeatMessage {
        entries: entries.iter().map(|(ua, hb)| (ua, *hb).into()).collect(),
    }
}

pub(crate) fn heartbeats_from_wire(message: protos::HeartbeatMessage) -> Vec<(UniqueAddress, u64)> {
    message
        .entries
        .into_iter()
        .filter_map(|entry| {
            let ua: UniqueAddress = entry.unique_address?.try_into().ok()?;
            Some((ua, entry.heartbeat))
        })
        .collect()
}
