//! gRPC adapter: the engine's remote operations over tonic.

mod client;
mod convert;
mod server;

pub use client::GrpcTransport;
pub use server::{serve, ChordService, ServerHandle};
