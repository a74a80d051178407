//! Selects which peers to gossip with on each tick: a handful of unknown
//! seed nodes first (to join them), then a random sample of known members
//! (to keep disseminating). Grounded on the teacher's
//! `select_gossip_destinations`, generalized from `Url`-keyed peers to
//! `Member`'s `UniqueAddress`-keyed ones.

use rand::seq::SliceRandom;
use url::Url;

use super::Cluster;
use crate::merge::{MemberSet, Tombstones};

const GOSSIP_DESTINATIONS_SAMPLE_SIZE: usize = 3;

/// A destination to exchange gossip with, plus the snapshot to send it.
#[derive(Debug)]
pub struct GossipDestination {
    pub url: Url,
    pub members: MemberSet,
    pub tombstones: Tombstones,
}

impl Cluster {
    /// Picks up to [`GOSSIP_DESTINATIONS_SAMPLE_SIZE`] destinations:
    /// unknown peer URLs first (so new seed nodes get discovered), then a
    /// random sample of already-known members' advertised URLs.
    pub fn select_gossip_destinations(&self) -> Vec<GossipDestination> {
        let mut destinations = Vec::new();

        for url in &self.unknown_peer_nodes {
            if destinations.len() >= GOSSIP_DESTINATIONS_SAMPLE_SIZE {
                break;
            }
            if *url == self.this_advertised_url {
                continue;
            }
            log::debug!(
                "[{}] exchanging gossip with unknown peer {}",
                self.this_unique_address,
                url
            );
            destinations.push(GossipDestination {
                url: url.clone(),
                members: self.members.clone(),
                tombstones: self.tombstones.clone(),
            });
        }

        let known_urls: Vec<Url> = self
            .members
            .iter()
            .filter(|m| m.unique_address != self.this_unique_address)
            .filter_map(|m| advertised_url(&m.unique_address))
            .filter(|url| *url != self.this_advertised_url)
            .collect();

        let remaining = GOSSIP_DESTINATIONS_SAMPLE_SIZE
            .saturating_sub(destinations.len())
            .min(known_urls.len());

        if remaining > 0 {
            log::debug!(
                "[{}] exchanging gossip with {} random known members",
                self.this_unique_address,
                remaining
            );
            for url in known_urls.choose_multiple(&mut rand::thread_rng(), remaining) {
                destinations.push(GossipDestination {
                    url: url.clone(),
                    members: self.members.clone(),
                    tombstones: self.tombstones.clone(),
                });
            }
        }

        destinations
    }

    /// Every other known member's reconstructed advertised URL, for
    /// heartbeat fan-out.
    pub(crate) fn known_member_urls(&self) -> Vec<(Url, crate::address::UniqueAddress)> {
        self.members
            .iter()
            .filter(|m| m.unique_address != self.this_unique_address)
            .filter_map(|m| advertised_url(&m.unique_address).map(|url| (url, m.unique_address.clone())))
            .collect()
    }
}

/// Reconstructs the advertised URL of a peer from its `Address` fields.
/// The membership core never stores a `Url` directly (spec §1 keeps wire
/// transport out of scope); this is the one seam where the `grpc` module's
/// needs meet the core's plain `(protocol, host, port)` identity.
fn advertised_url(ua: &crate::address::UniqueAddress) -> Option<Url> {
    let host = ua.address.host.as_deref()?;
    let port = ua.address.port?;
    Url::parse(&format!("{}://{}:{}", ua.address.protocol, host, port)).ok()
}
