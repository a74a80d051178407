use std::{error::Error, sync::Arc};

use tonic::{transport::Channel, Request};
use url::Url;

use super::dtos_conversions::{heartbeats_from_wire, heartbeats_to_wire, snapshot_from_wire, snapshot_to_wire};
use super::{protos, TonicChannelFactory};
use crate::address::UniqueAddress;
use crate::merge::{MemberSet, Tombstones};

pub(crate) struct CouncilClient {
    pub(crate) tonic_channel_factory: Arc<dyn TonicChannelFactory + Send + Sync>,
}

impl CouncilClient {
    pub(crate) async fn exchange_gossip(
        &self,
        node_advertised_url: Url,
        sender: &UniqueAddress,
        members: &MemberSet,
        tombstones: &Tombstones,
    ) -> Result<(Option<UniqueAddress>, MemberSet, Tombstones), Box<dyn Error + Send + Sync + 'static>> {
        let mut client = self.get_client_for_url(node_advertised_url).await?;
        let request = Request::new(snapshot_to_wire(sender, members, tombstones));
        let response = client.exchange_gossip(request).await?;
        Ok(snapshot_from_wire(response.into_inner()))
    }

    pub(crate) async fn exchange_heartbeats(
        &self,
        node_advertised_url: Url,
        entries: &[(UniqueAddress, u64)],
    ) -> Result<Vec<(UniqueAddress, u64)>, Box<dyn Error + Send + Sync + 'static>> {
        let mut client = self.get_client_for_url(node_advertised_url).await?;
        let request = Request::new(heartbeats_to_wire(entries));
        let response = client.exchange_heartbeats(request).await?;
        Ok(heartbeats_from_wire(response.into_inner()))
    }

    async fn get_client_for_url(
        &self,
        url: Url,
    ) -> Result<
        protos::gossip_service_client::GossipServiceClient<Channel>,
        Box<dyn Error + Send + Sync + 'static>,
    > {
        let channel = self.tonic_channel_factory.channel_for_url(url).await?;
        Ok(protos::gossip_service_client::GossipServiceClient::new(channel))
    }
}
