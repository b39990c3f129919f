use tracing::{debug, info, instrument, warn};

use super::{message::{Request, Response, RpcCode}, state::Phase, ChordNode};
use crate::{chord_id::ChordId, error::{ChordError, Result}, node::NodeDescriptor};


impl<I: ChordId> ChordNode<I>{

	/// The node owning `id`: the first node at or clockwise after it.
	#[instrument(skip(self), fields(node = %self.name()))]
	pub async fn find_successor(&self, id: &I) -> Result<NodeDescriptor<I>> {
		let successor = self.get_successor();
		if id.is_between(self.id(), successor.id()) {
			return Ok(successor);
		}
		let (_, successor) = self.walk_to_predecessor(id).await?;
		Ok(successor)
	}

	/// The node immediately preceding the owner of `id`.
	#[instrument(skip(self), fields(node = %self.name()))]
	pub async fn find_predecessor(&self, id: &I) -> Result<NodeDescriptor<I>> {
		let (predecessor, _) = self.walk_to_predecessor(id).await?;
		Ok(predecessor)
	}

	/// Walk the ring from this node until `id` falls in `(current, current.successor]`,
	/// returning that pair. Each hop asks the current node for its closest
	/// preceding finger and falls back to its successor when the finger is no
	/// help or cannot be reached.
	pub(crate) async fn walk_to_predecessor(&self, id: &I) -> Result<(NodeDescriptor<I>, NodeDescriptor<I>)> {
		let max_hops = self.config().max_lookup_hops;
		let mut current = self.descriptor().clone();
		let mut successor = self.get_successor();

		for hop in 0..max_hops {
			if id.is_between(current.id(), successor.id()) {
				debug!("{} resolved after {} hops", id, hop);
				return Ok((current, successor));
			}

			let candidate = match self.remote_closest_preceding_finger(&current, id).await {
				Ok(finger) if finger != current => finger,
				Ok(_) => successor.clone(),
				Err(e) => {
					if e.is_unreachable() {
						self.forget(&current);
					}
					return Err(e);
				},
			};

			match self.remote_get_successor(&candidate).await {
				Ok(next) => {
					current = candidate;
					successor = next;
				},
				Err(e) if e.is_unreachable() && candidate != successor => {
					warn!("{} unreachable during lookup, falling back to {}", candidate, successor);
					self.forget(&candidate);
					let next = match self.remote_get_successor(&successor).await {
						Ok(next) => next,
						Err(e) => {
							if e.is_unreachable() {
								self.forget(&successor);
							}
							return Err(e);
						},
					};
					current = successor;
					successor = next;
				},
				Err(e) => {
					if e.is_unreachable() {
						self.forget(&candidate);
					}
					return Err(e);
				},
			}
		}

		Err(ChordError::LookupExhausted{ id: id.to_string(), hops: max_hops })
	}

	/// The farthest finger strictly between this node and `id`, or this node
	/// if none qualifies.
	pub fn closest_preceding_finger(&self, id: &I) -> NodeDescriptor<I> {
		let state = self.inner.state.lock();
		match state.fingers.closest_preceding(id) {
			Some(finger) => finger.clone(),
			None => self.descriptor().clone(),
		}
	}

	/// Enter the ring `bootstrap` belongs to. On failure the node keeps the
	/// pointers it had before the call.
	#[instrument(skip(self), fields(node = %self.name()))]
	pub async fn join(&self, bootstrap: &NodeDescriptor<I>) -> Result<()> {
		if bootstrap == self.descriptor() {
			debug!("{} asked to join through itself", self.name());
			return Ok(());
		}

		let previous = std::mem::replace(&mut self.inner.state.lock().phase, Phase::Joining);
		let successor = match self.remote_find_successor(bootstrap, self.id()).await {
			Ok(successor) => successor,
			Err(e) => {
				// a stabilize that finished meanwhile already set the right phase
				let mut state = self.inner.state.lock();
				if state.phase == Phase::Joining {
					state.phase = previous;
				}
				return Err(e);
			},
		};

		{
			let mut state = self.inner.state.lock();
			state.predecessor = None;
			state.fingers.reset();
			state.set_successor(successor.clone());
		}
		info!("{} joined through {}, successor is {}", self.name(), bootstrap, successor);
		Ok(())
	}

	pub fn get_predecessor(&self) -> Option<NodeDescriptor<I>> {
		self.inner.state.lock().predecessor.clone()
	}

	pub fn set_predecessor(&self, node: Option<NodeDescriptor<I>>) {
		self.inner.state.lock().predecessor = node;
	}

	pub fn get_successor(&self) -> NodeDescriptor<I> {
		self.inner.state.lock().successor.clone()
	}

	pub fn set_successor(&self, node: NodeDescriptor<I>) {
		self.inner.state.lock().set_successor(node);
	}

	/// Answering at all is the answer.
	pub fn ping(&self) -> bool {
		true
	}

	/// True if `target` answered a ping within the RPC timeout.
	pub async fn ping_node(&self, target: &NodeDescriptor<I>) -> bool {
		matches!(self.invoke(target, Request::Ping).await, Ok(Response::Pong{ alive: true }))
	}

	/// Hand a payload to the registered handler. Routing is the sender's job.
	pub fn receive(&self, message: String) -> Result<()> {
		self.check_message_len(&message)?;
		let handler = self.inner.handler.read().clone();
		match handler {
			Some(handler) => handler.deliver(message),
			None => warn!("{} dropped a message, no receive handler registered", self.name()),
		}
		Ok(())
	}

	/// Deliver `message` to whichever node owns `id`, returning that node.
	#[instrument(skip(self, message), fields(node = %self.name()))]
	pub async fn send(&self, id: &I, message: String) -> Result<NodeDescriptor<I>> {
		self.check_message_len(&message)?;
		let owner = self.find_successor(id).await?;
		self.invoke(&owner, Request::Receive{ message }).await?.into_done(RpcCode::Receive)?;
		debug!("{} delivered a message to {}", self.name(), owner);
		Ok(owner)
	}

	/// `send` addressed by the name whose hash is the key.
	pub async fn send_to_name(&self, name: &str, message: String) -> Result<NodeDescriptor<I>> {
		self.send(&I::from_name(name), message).await
	}

	fn check_message_len(&self, message: &str) -> Result<()> {
		let max = self.config().max_message_len;
		if message.len() > max {
			return Err(ChordError::MessageTooLarge{ len: message.len(), max });
		}
		Ok(())
	}


	// Typed calls on any node, local or remote

	pub async fn remote_find_successor(&self, target: &NodeDescriptor<I>, id: &I) -> Result<NodeDescriptor<I>> {
		self.invoke(target, Request::FindSuccessor{ id: id.clone() }).await?.into_node(RpcCode::FindSuccessor)
	}

	pub async fn remote_closest_preceding_finger(&self, target: &NodeDescriptor<I>, id: &I) -> Result<NodeDescriptor<I>> {
		self.invoke(target, Request::ClosestPrecedingFinger{ id: id.clone() }).await?.into_node(RpcCode::ClosestPrecedingFinger)
	}

	pub async fn remote_get_predecessor(&self, target: &NodeDescriptor<I>) -> Result<Option<NodeDescriptor<I>>> {
		self.invoke(target, Request::GetPredecessor).await?.into_predecessor(RpcCode::GetPredecessor)
	}

	pub async fn remote_get_successor(&self, target: &NodeDescriptor<I>) -> Result<NodeDescriptor<I>> {
		self.invoke(target, Request::GetSuccessor).await?.into_node(RpcCode::GetSuccessor)
	}

	pub async fn remote_get_id(&self, target: &NodeDescriptor<I>) -> Result<I> {
		self.invoke(target, Request::GetId).await?.into_id(RpcCode::GetId)
	}

	pub async fn remote_notify(&self, target: &NodeDescriptor<I>) -> Result<()> {
		let request = Request::Notify{ candidate: self.descriptor().clone() };
		self.invoke(target, request).await?.into_done(RpcCode::Notify)
	}
}
