use std::{future::Future, pin::Pin, sync::Arc};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;

use crate::{chord::message::{Request, Response}, chord_id::ChordId, error::TransportError, node::NodeDescriptor};

pub mod tcp_adaptor;
pub mod memory_adaptor;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// The inbound side of a transport: whatever answers requests addressed to a
/// listening node. Failures are reported inside the response.
pub trait RequestHandler<I: ChordId>: Send + Sync + 'static{
	fn handle(&self, request: Request<I>) -> BoxFuture<Response<I>>;
}

/// Moves requests between nodes that do not share a process.
///
/// Calls are never made for the local node; those are dispatched directly.
/// Implementations need not bound their own latency, the caller wraps every
/// call in a timeout.
#[async_trait]
pub trait ChordAdaptor<I: ChordId>: Send + Sync + 'static{

	// outgoing request, waits for the reply
	async fn call(&self, target: &NodeDescriptor<I>, request: Request<I>) -> Result<Response<I>, TransportError>;

	// incoming requests, answered by handler until the returned task is aborted
	async fn listen(&self, local: &NodeDescriptor<I>, handler: Arc<dyn RequestHandler<I>>) -> Result<JoinHandle<()>, TransportError>;
}

pub(crate) fn encode_frame<T: Serialize>(msg: &T, max_len: usize) -> Result<Vec<u8>, TransportError>{
	let data = serde_json::to_vec(msg).map_err(|e| TransportError::Malformed{ peer: "local".to_string(), reason: e.to_string() })?;
	if data.len() > max_len {
		return Err(TransportError::FrameTooLarge{ len: data.len(), max: max_len });
	}
	Ok(data)
}

pub(crate) fn decode_frame<T: DeserializeOwned>(peer: &str, data: &[u8]) -> Result<T, TransportError>{
	serde_json::from_slice(data).map_err(|e| TransportError::Malformed{ peer: peer.to_string(), reason: e.to_string() })
}
