//! [`CouncilBuilder`]: assembles a [`Council`] and spawns its background
//! task. Mirrors the teacher's own builder-with-defaults shape.

use std::{collections::HashSet, sync::Arc, time::Duration};

use tokio::sync::{broadcast, mpsc};
use url::Url;

use crate::{
    address::{Address, UniqueAddress},
    cluster::downing::{AutoDownUnreachableAfter, DowningPolicy, PuppetDowningPolicy},
    cluster::failure_detector::FailureDetector,
    cluster::Cluster,
    config::ClusterSettings,
    grpc::client::CouncilClient,
    grpc::{DefaultTonicChannelFactory, TonicChannelFactory},
    Council,
};

fn address_from_url(url: &Url) -> Address {
    Address {
        protocol: url.scheme().to_string(),
        system: "council".to_string(),
        host: url.host_str().map(str::to_string),
        port: url.port_or_known_default(),
    }
}

pub struct CouncilBuilder {
    this_node_advertised_url: Url,
    peer_nodes: HashSet<Url>,
    settings: ClusterSettings,
    downing_policy: Arc<dyn DowningPolicy>,
    failure_detector_phi_threshold: f64,
    gossip_interval: Duration,
    heartbeat_interval: Duration,
    leader_tick_interval: Duration,
    tonic_channel_factory: Arc<dyn TonicChannelFactory + Send + Sync>,
}

impl CouncilBuilder {
    pub fn new(this_node_advertised_url: Url) -> Self {
        Self {
            this_node_advertised_url,
            peer_nodes: HashSet::new(),
            settings: ClusterSettings::default(),
            downing_policy: Arc::new(PuppetDowningPolicy::new()),
            failure_detector_phi_threshold: 8.0,
            gossip_interval: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(1),
            leader_tick_interval: Duration::from_secs(1),
            tonic_channel_factory: Arc::new(DefaultTonicChannelFactory::new()),
        }
    }

    pub fn with_tonic_channel_factory<F: TonicChannelFactory + Send + Sync + 'static>(mut self, factory: F) -> Self {
        self.tonic_channel_factory = Arc::new(factory);
        self
    }

    pub fn with_tonic_channel_factory_arc<F: TonicChannelFactory + Send + Sync + 'static>(
        mut self,
        factory: Arc<F>,
    ) -> Self {
        self.tonic_channel_factory = factory;
        self
    }

    pub fn with_peer_nodes(mut self, peer_nodes: &[Url]) -> Self {
        self.peer_nodes.extend(peer_nodes.iter().cloned());
        self
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = String>) -> Self {
        self.settings.roles = roles.into_iter().collect();
        self
    }

    pub fn with_app_version(mut self, app_version: crate::app_version::AppVersion) -> Self {
        self.settings.app_version = app_version;
        self
    }

    pub fn with_allow_weakly_up_members(mut self, after: Duration) -> Self {
        self.settings.allow_weakly_up_members = Some(after);
        self
    }

    pub fn with_weakly_up_batch_limit(mut self, limit: usize) -> Self {
        self.settings.weakly_up_batch_limit = limit;
        self
    }

    /// Replaces the downing policy entirely (the default is
    /// [`PuppetDowningPolicy`], which never downs anyone on its own).
    pub fn with_downing_policy<P: DowningPolicy + 'static>(mut self, policy: P) -> Self {
        self.downing_policy = Arc::new(policy);
        self
    }

    /// Convenience over `with_downing_policy` for spec §6's built-in
    /// policy.
    pub fn with_auto_down_unreachable_after(mut self, after: Duration) -> Self {
        self.downing_policy = Arc::new(AutoDownUnreachableAfter::new(after));
        self
    }

    pub fn with_failure_detector_phi_threshold(mut self, threshold: f64) -> Self {
        self.failure_detector_phi_threshold = threshold;
        self
    }

    pub fn with_gossip_interval(mut self, interval: Duration) -> Self {
        self.gossip_interval = interval;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_leader_tick_interval(mut self, interval: Duration) -> Self {
        self.leader_tick_interval = interval;
        self
    }

    pub fn build(self) -> Council {
        let (cluster_events_sender, _cluster_events_receiver) = broadcast::channel(64);
        let (message_sender, message_receiver) = mpsc::channel(64);

        let gossip_interval = tokio::time::interval(self.gossip_interval);
        let heartbeat_interval = tokio::time::interval(self.heartbeat_interval);
        let leader_tick_interval = tokio::time::interval(self.leader_tick_interval);

        let this_unique_address = UniqueAddress::new_incarnation(address_from_url(&self.this_node_advertised_url));

        let cluster = Cluster::new(
            this_unique_address.clone(),
            self.this_node_advertised_url,
            self.peer_nodes,
            self.settings,
            self.downing_policy,
            Arc::new(FailureDetector::new(this_unique_address.clone(), self.failure_detector_phi_threshold)),
        )
        .expect("CouncilBuilder's default roles always carry exactly one datacenter role");

        let client = Arc::new(CouncilClient {
            tonic_channel_factory: Arc::clone(&self.tonic_channel_factory),
        });

        let main_thread = tokio::spawn(Council::main_thread(
            gossip_interval,
            heartbeat_interval,
            leader_tick_interval,
            cluster,
            message_receiver,
            cluster_events_sender.clone(),
            client,
            message_sender.clone(),
        ));

        Council {
            this_unique_address,
            cluster_events_sender,
            tonic_channel_factory: self.tonic_channel_factory,
            main_thread_message_sender: message_sender,
            main_thread,
        }
    }
}
