pub use protos::gossip_service_server::GossipServiceServer;
use tokio::sync::{mpsc::Sender, oneshot};
use tonic::{async_trait, Response, Status};

use super::dtos_conversions::{heartbeats_from_wire, heartbeats_to_wire, snapshot_from_wire, snapshot_to_wire};
use super::protos;
use crate::{Council, Message};

pub struct CouncilGrpcServer {
    main_thread_message_sender: Sender<Message>,
}

impl Council {
    /// Returns a Tonic gRPC server exposing this node's gossip service.
    /// To actually start accepting requests, add it to a
    /// [`tonic::transport::Server`]:
    ///
    /// ```rust,no_run
    /// use tonic::transport::Server;
    /// use url::Url;
    /// use council::Council;
    ///
    /// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
    /// let advertised_url = Url::parse("http://localhost:50051")?;
    /// let council = Council::builder(advertised_url).build();
    /// Server::builder()
    ///     .add_service(council.gossip_grpc_service())
    ///     .serve("[::1]:50051".parse()?)
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn gossip_grpc_service(&self) -> GossipServiceServer<CouncilGrpcServer> {
        let server = CouncilGrpcServer {
            main_thread_message_sender: self.main_thread_message_sender.clone(),
        };
        GossipServiceServer::new(server)
    }
}

#[async_trait]
impl protos::gossip_service_server::GossipService for CouncilGrpcServer {
    async fn exchange_gossip(
        &self,
        request: tonic::Request<protos::GossipSnapshot>,
    ) -> Result<tonic::Response<protos::GossipSnapshot>, tonic::Status> {
        let (sender, members, tombstones) = snapshot_from_wire(request.into_inner());
        let Some(sender) = sender else {
            return Err(Status::invalid_argument("GossipSnapshot.sender is required"));
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        self.main_thread_message_sender
            .send(Message::IncomingGossip {
                sender,
                members,
                tombstones,
                reply: reply_tx,
            })
            .await
            .map_err(|e| Status::unavailable(e.to_string()))?;
        let (self_address, our_members, our_tombstones) =
            reply_rx.await.map_err(|e| Status::from_error(Box::new(e)))?;
        Ok(Response::new(snapshot_to_wire(&self_address, &our_members, &our_tombstones)))
    }

    async fn exchange_heartbeats(
        &self,
        request: tonic::Request<protos::HeartbeatMessage>,
    ) -> Result<tonic::Response<protos::HeartbeatMessage>, tonic::Status> {
        let entries = heartbeats_from_wire(request.into_inner());

        let (reply_tx, reply_rx) = oneshot::channel();
        self.main_thread_message_sender
            .send(Message::IncomingHeartbeats { entries, reply: reply_tx })
            .await
            .map_err(|e| Status::unavailable(e.to_string()))?;
        let reply = reply_rx.await.map_err(|e| Status::from_error(Box::new(e)))?;
        Ok(Response::new(heartbeats_to_wire(&reply)))
    }
}
