//! Storage service gateway and its implementations.

mod client;
mod error;
mod gateway;
mod memory;

pub use client::HttpGateway;
pub use error::GatewayError;
pub use gateway::{GatewayResult, MoveTarget, StorageGateway, PARENT_SENTINEL};
pub use memory::{GatewayCall, MemoryGateway};
