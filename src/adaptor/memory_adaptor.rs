use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::{sync::{mpsc, oneshot}, task::JoinHandle};
use tracing::{debug, trace};

use super::{decode_frame, encode_frame, ChordAdaptor, RequestHandler};
use crate::{chord::message::{Request, Response}, chord_id::ChordId, error::TransportError, node::NodeDescriptor};

const INBOX_SIZE: usize = 64;

type Envelope = (Vec<u8>, oneshot::Sender<Vec<u8>>);

/// An in-process network. Every clone shares the same address table, so
/// several nodes in one process reach each other through it. Requests and
/// replies still travel as encoded frames.
///
/// A node is reachable while its listener task runs; aborting the task (or
/// calling `disconnect`) makes it unreachable. A stopped listener removes its
/// address. Registering an address that is already taken replaces the
/// previous listener.
#[derive(Clone)]
pub struct MemoryAdaptor<I: ChordId>{
	peers: Arc<RwLock<HashMap<String, mpsc::Sender<Envelope>>>>,
	max_frame_len: usize,
	_id: std::marker::PhantomData<fn() -> I>,
}

impl<I: ChordId> MemoryAdaptor<I>{
	pub fn new() -> Self{
		Self::with_max_frame_len(crate::config::ChordConfig::default().max_frame_len)
	}

	pub fn with_max_frame_len(max_frame_len: usize) -> Self{
		MemoryAdaptor{
			peers: Arc::new(RwLock::new(HashMap::new())),
			max_frame_len,
			_id: std::marker::PhantomData,
		}
	}

	/// Remove a node's address, as if its host dropped off the network.
	pub fn disconnect(&self, address: &str) -> bool {
		self.peers.write().remove(address).is_some()
	}

	pub fn addresses(&self) -> Vec<String> {
		self.peers.read().keys().cloned().collect()
	}
}

impl<I: ChordId> Default for MemoryAdaptor<I>{
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl<I: ChordId> ChordAdaptor<I> for MemoryAdaptor<I>{

	async fn call(&self, target: &NodeDescriptor<I>, request: Request<I>) -> Result<Response<I>, TransportError> {
		let peer = target.address();
		let unreachable = |reason: &str| TransportError::Unreachable{ peer: peer.clone(), reason: reason.to_string() };

		let inbox = self.peers.read().get(&peer).cloned();
		let inbox = inbox.ok_or_else(|| unreachable("no such address"))?;

		let frame = encode_frame(&request, self.max_frame_len)?;
		let (reply_tx, reply_rx) = oneshot::channel();
		trace!("memory call {:?} to {}", request.code(), peer);
		inbox.send((frame, reply_tx)).await.map_err(|_| unreachable("listener stopped"))?;
		let reply = reply_rx.await.map_err(|_| unreachable("request dropped"))?;
		decode_frame(&peer, &reply)
	}

	async fn listen(&self, local: &NodeDescriptor<I>, handler: Arc<dyn RequestHandler<I>>) -> Result<JoinHandle<()>, TransportError> {
		let address = local.address();
		let (inbox_tx, mut inbox_rx) = mpsc::channel::<Envelope>(INBOX_SIZE);
		if self.peers.write().insert(address.clone(), inbox_tx.clone()).is_some() {
			debug!("{} was already registered, replacing it", address);
		}
		let max_frame_len = self.max_frame_len;
		let registration = Registration{
			peers: self.peers.clone(),
			address: address.clone(),
			inbox: inbox_tx,
		};

		Ok(tokio::spawn(async move{
			let _registration = registration;
			while let Some((frame, reply)) = inbox_rx.recv().await {
				let handler = handler.clone();
				let address = address.clone();
				// requests are answered concurrently, a slow lookup must not block a ping
				tokio::spawn(async move{
					let response = match decode_frame::<Request<I>>("memory peer", &frame) {
						Ok(request) => handler.handle(request).await,
						Err(e) => Response::Error{ msg: e.to_string() },
					};
					match encode_frame(&response, max_frame_len) {
						Ok(data) => { let _ = reply.send(data); },
						Err(e) => debug!("{} could not encode reply: {}", address, e),
					}
				});
			}
		}))
	}
}

/// Keeps a listener's address in the table for as long as the listener task
/// lives, unless a newer listener took the address over.
struct Registration{
	peers: Arc<RwLock<HashMap<String, mpsc::Sender<Envelope>>>>,
	address: String,
	inbox: mpsc::Sender<Envelope>,
}

impl Drop for Registration{
	fn drop(&mut self) {
		let mut peers = self.peers.write();
		if peers.get(&self.address).map_or(false, |current| current.same_channel(&self.inbox)) {
			peers.remove(&self.address);
			trace!("{} deregistered", self.address);
		}
	}
}
