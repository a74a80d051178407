#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Interval;
use tokio_stream::wrappers::BroadcastStream;
use url::Url;

pub mod address;
pub mod app_version;
pub mod builder;
pub mod cluster;
pub mod config;
pub mod error;
pub mod grpc;
pub mod member;
pub mod merge;
pub mod ordering;
pub mod status;

pub use address::{Address, UniqueAddress};
pub use app_version::AppVersion;
pub use builder::CouncilBuilder;
pub use cluster::ClusterEvent;
pub use error::MembershipError;
pub use member::Member;
pub use merge::{MemberSet, Tombstones};
pub use status::MemberStatus;

use cluster::Cluster;
use grpc::client::CouncilClient;
use grpc::TonicChannelFactory;

/// Messages the gRPC server and `Council`'s own background tasks feed back
/// onto the single task that owns the `Cluster`. This is the "single
/// serial executor" from spec §5: every mutation of `Cluster` happens
/// inside `Council::main_thread`'s `select!` loop, one message at a time.
pub(crate) enum Message {
    IncomingGossip {
        sender: UniqueAddress,
        members: MemberSet,
        tombstones: Tombstones,
        reply: oneshot::Sender<(UniqueAddress, MemberSet, Tombstones)>,
    },
    GossipRoundTripCompleted {
        sender: UniqueAddress,
        members: MemberSet,
        tombstones: Tombstones,
    },
    IncomingHeartbeats {
        entries: Vec<(UniqueAddress, u64)>,
        reply: oneshot::Sender<Vec<(UniqueAddress, u64)>>,
    },
    HeartbeatRoundTripCompleted(Vec<(UniqueAddress, u64)>),
    MarkUnavailable(UniqueAddress),
    MarkAvailable(UniqueAddress),
    ApplyDowning(UniqueAddress),
    GetMembers(oneshot::Sender<MemberSet>),
    GetLeader(String, oneshot::Sender<Option<UniqueAddress>>),
    GetOldest(String, oneshot::Sender<Option<UniqueAddress>>),
    GetUnreachable(oneshot::Sender<HashSet<UniqueAddress>>),
}

/// A running membership participant: owns a background task driving a
/// [`Cluster`], and a handle to talk to it. Built via [`Council::builder`].
pub struct Council {
    pub(crate) this_unique_address: UniqueAddress,
    pub(crate) cluster_events_sender: broadcast::Sender<ClusterEvent>,
    #[allow(dead_code)]
    pub(crate) tonic_channel_factory: Arc<dyn TonicChannelFactory + Send + Sync>,
    pub(crate) main_thread_message_sender: mpsc::Sender<Message>,
    #[allow(dead_code)]
    pub(crate) main_thread: tokio::task::JoinHandle<()>,
}

impl Council {
    pub fn builder(this_node_advertised_url: Url) -> CouncilBuilder {
        CouncilBuilder::new(this_node_advertised_url)
    }

    /// This node's own identity, as gossiped to its peers.
    pub fn this_unique_address(&self) -> &UniqueAddress {
        &self.this_unique_address
    }

    /// A fresh stream of membership events from this point on. Each call
    /// subscribes independently, so multiple consumers (the gRPC server's
    /// metrics, a demo UI) never steal events from one another.
    pub fn events(&self) -> BroadcastStream<ClusterEvent> {
        BroadcastStream::new(self.cluster_events_sender.subscribe())
    }

    pub async fn members(&self) -> Option<MemberSet> {
        self.query(Message::GetMembers).await
    }

    pub async fn leader(&self, data_center: impl Into<String>) -> Option<UniqueAddress> {
        self.query(|reply| Message::GetLeader(data_center.into(), reply)).await?
    }

    pub async fn oldest(&self, data_center: impl Into<String>) -> Option<UniqueAddress> {
        self.query(|reply| Message::GetOldest(data_center.into(), reply)).await?
    }

    pub async fn unreachable(&self) -> Option<HashSet<UniqueAddress>> {
        self.query(Message::GetUnreachable).await
    }

    pub async fn mark_node_as_unavailable(&self, ua: UniqueAddress) {
        let _ = self.main_thread_message_sender.send(Message::MarkUnavailable(ua)).await;
    }

    pub async fn mark_node_as_available(&self, ua: UniqueAddress) {
        let _ = self.main_thread_message_sender.send(Message::MarkAvailable(ua)).await;
    }

    pub async fn apply_downing(&self, ua: UniqueAddress) {
        let _ = self.main_thread_message_sender.send(Message::ApplyDowning(ua)).await;
    }

    async fn query<T: Send + 'static>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Message) -> Option<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.main_thread_message_sender.send(make(reply_tx)).await.ok()?;
        reply_rx.await.ok()
    }

    pub(crate) async fn main_thread(
        mut gossip_interval: Interval,
        mut heartbeat_interval: Interval,
        mut leader_tick_interval: Interval,
        mut cluster: Cluster,
        mut message_receiver: mpsc::Receiver<Message>,
        cluster_events_sender: broadcast::Sender<ClusterEvent>,
        client: Arc<CouncilClient>,
        self_message_sender: mpsc::Sender<Message>,
    ) {
        let mut own_heartbeat_sequence: u64 = 0;

        loop {
            tokio::select! {
                _ = gossip_interval.tick() => {
                    let sender = cluster.this_unique_address.clone();
                    for destination in cluster.select_gossip_destinations() {
                        let client = Arc::clone(&client);
                        let sender = sender.clone();
                        let reply_tx = self_message_sender.clone();
                        tokio::spawn(async move {
                            if let Ok((Some(remote_sender), members, tombstones)) = client
                                .exchange_gossip(destination.url, &sender, &destination.members, &destination.tombstones)
                                .await
                            {
                                let _ = reply_tx
                                    .send(Message::GossipRoundTripCompleted { sender: remote_sender, members, tombstones })
                                    .await;
                            }
                        });
                    }
                }
                _ = heartbeat_interval.tick() => {
                    own_heartbeat_sequence += 1;
                    let entries = vec![(cluster.this_unique_address.clone(), own_heartbeat_sequence)];
                    for (url, _ua) in cluster.known_member_urls() {
                        let client = Arc::clone(&client);
                        let entries = entries.clone();
                        let reply_tx = self_message_sender.clone();
                        tokio::spawn(async move {
                            if let Ok(remote_entries) = client.exchange_heartbeats(url, &entries).await {
                                let _ = reply_tx.send(Message::HeartbeatRoundTripCompleted(remote_entries)).await;
                            }
                        });
                    }
                    for event in cluster.refresh_reachability(Instant::now()) {
                        let _ = cluster_events_sender.send(event);
                    }
                }
                _ = leader_tick_interval.tick() => {
                    for event in cluster.leader_actions(Instant::now()) {
                        let _ = cluster_events_sender.send(event);
                    }
                }
                Some(message) = message_receiver.recv() => {
                    match message {
                        Message::IncomingGossip { sender, members, tombstones, reply } => {
                            for event in cluster.observe_gossip(sender, members, tombstones) {
                                let _ = cluster_events_sender.send(event);
                            }
                            let _ = reply.send((
                                cluster.this_unique_address.clone(),
                                cluster.members().clone(),
                                cluster.tombstones().clone(),
                            ));
                        }
                        Message::GossipRoundTripCompleted { sender, members, tombstones } => {
                            for event in cluster.observe_gossip(sender, members, tombstones) {
                                let _ = cluster_events_sender.send(event);
                            }
                        }
                        Message::IncomingHeartbeats { entries, reply } => {
                            for (ua, sequence) in entries {
                                cluster.record_heartbeat(ua, sequence);
                            }
                            for event in cluster.refresh_reachability(Instant::now()) {
                                let _ = cluster_events_sender.send(event);
                            }
                            let _ = reply.send(vec![(cluster.this_unique_address.clone(), own_heartbeat_sequence)]);
                        }
                        Message::HeartbeatRoundTripCompleted(entries) => {
                            for (ua, sequence) in entries {
                                cluster.record_heartbeat(ua, sequence);
                            }
                        }
                        Message::MarkUnavailable(ua) => {
                            for event in cluster.mark_node_as_unavailable(ua) {
                                let _ = cluster_events_sender.send(event);
                            }
                        }
                        Message::MarkAvailable(ua) => {
                            for event in cluster.mark_node_as_available(ua) {
                                let _ = cluster_events_sender.send(event);
                            }
                        }
                        Message::ApplyDowning(ua) => {
                            for event in cluster.apply_downing(&ua) {
                                let _ = cluster_events_sender.send(event);
                            }
                        }
                        Message::GetMembers(reply) => {
                            let _ = reply.send(cluster.members().clone());
                        }
                        Message::GetLeader(data_center, reply) => {
                            let _ = reply.send(cluster.leader(&data_center));
                        }
                        Message::GetOldest(data_center, reply) => {
                            let _ = reply.send(cluster.oldest(&data_center));
                        }
                        Message::GetUnreachable(reply) => {
                            let _ = reply.send(cluster.unreachable());
                        }
                    }
                }
                else => break,
            }
        }
    }
}
