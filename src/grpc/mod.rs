mod protos {
    tonic::include_proto!("council");
}

mod channel_factory;
pub(crate) mod client;
mod dtos_conversions;
mod server;

pub use channel_factory::{DefaultTonicChannelFactory, TonicChannelFactory, TonicChannelFactoryCache};
pub use server::*;
