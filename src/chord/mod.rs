use crate::{
	adaptor::{BoxFuture, ChordAdaptor, RequestHandler},
	chord_id::ChordId,
	config::ChordConfig,
	delivery::MessageHandler,
	error::{ChordError, Result, TransportError},
	node::NodeDescriptor,
};

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, trace, warn};


pub mod message;
pub mod state;

mod maintenance;
mod private_ops;
mod public_ops;

use message::{Request, Response};
use state::{NodeStatus, RingState};


/// A ring participant. Cloning is cheap and every clone refers to the same
/// node, so a clone can be handed to the transport, the maintenance task and
/// the application at once.
#[derive(Clone)]
pub struct ChordNode<I: ChordId>{
	inner: Arc<NodeInner<I>>,
}

struct NodeInner<I: ChordId>{
	descriptor: NodeDescriptor<I>,
	config: ChordConfig,
	state: Mutex<RingState<I>>,
	handler: RwLock<Option<Arc<dyn MessageHandler>>>,
	adaptor: Arc<dyn ChordAdaptor<I>>,
}

impl<I: ChordId> ChordNode<I>{

	/// A node alone on its own ring. It is not reachable by peers until a
	/// listener is started for it.
	pub fn new(descriptor: NodeDescriptor<I>, adaptor: Arc<dyn ChordAdaptor<I>>, config: ChordConfig) -> Self{
		let state = Mutex::new(RingState::new(&descriptor));
		ChordNode{
			inner: Arc::new(NodeInner{
				descriptor,
				config,
				state,
				handler: RwLock::new(None),
				adaptor,
			}),
		}
	}

	pub fn descriptor(&self) -> &NodeDescriptor<I> {
		&self.inner.descriptor
	}

	pub fn id(&self) -> &I {
		self.inner.descriptor.id()
	}

	pub fn name(&self) -> &str {
		self.inner.descriptor.name()
	}

	pub fn host(&self) -> &str {
		self.inner.descriptor.host()
	}

	pub fn port(&self) -> u16 {
		self.inner.descriptor.port()
	}

	pub fn config(&self) -> &ChordConfig {
		&self.inner.config
	}

	/// Register the handler `receive` passes payloads to, replacing any
	/// previous one.
	pub fn set_receive_handler<H: MessageHandler + 'static>(&self, handler: H) {
		*self.inner.handler.write() = Some(Arc::new(handler));
	}

	pub fn clear_receive_handler(&self) {
		*self.inner.handler.write() = None;
	}

	pub fn status(&self) -> NodeStatus<I> {
		self.inner.state.lock().snapshot(&self.inner.descriptor)
	}

	/// Invoke an operation on any node. The local node is called directly,
	/// anything else goes through the adaptor and is bounded by the RPC timeout.
	pub async fn invoke(&self, target: &NodeDescriptor<I>, request: Request<I>) -> Result<Response<I>> {
		if target == &self.inner.descriptor {
			return self.dispatch(request).await;
		}
		let code = request.code();
		trace!("{} -> {}: {:?}", self.name(), target, code);
		match timeout(self.inner.config.rpc_timeout(), self.inner.adaptor.call(target, request)).await {
			Ok(Ok(Response::Error{msg})) => Err(ChordError::Remote(msg)),
			Ok(Ok(response)) => Ok(response),
			Ok(Err(e)) => Err(e.into()),
			Err(_) => Err(TransportError::Timeout{ peer: target.address() }.into()),
		}
	}

	/// Execute a request against this node.
	pub fn dispatch(&self, request: Request<I>) -> BoxFuture<Result<Response<I>>> {
		let node = self.clone();
		Box::pin(async move{
			let response = match request{
				Request::FindPredecessor{id} => Response::Node{node: node.find_predecessor(&id).await?},
				Request::FindSuccessor{id} => Response::Node{node: node.find_successor(&id).await?},
				Request::ClosestPrecedingFinger{id} => Response::Node{node: node.closest_preceding_finger(&id)},
				Request::Join{bootstrap} => {
					node.join(&bootstrap).await?;
					Response::Done
				},
				Request::Stabilize => {
					node.stabilize().await?;
					Response::Done
				},
				Request::Notify{candidate} => {
					node.notify(candidate).await?;
					Response::Done
				},
				Request::FixFinger => {
					node.fix_fingers().await?;
					Response::Done
				},
				Request::GetPredecessor => Response::Predecessor{node: node.get_predecessor()},
				Request::SetPredecessor{node: predecessor} => {
					node.set_predecessor(predecessor);
					Response::Done
				},
				Request::GetSuccessor => Response::Node{node: node.get_successor()},
				Request::SetSuccessor{node: successor} => {
					node.set_successor(successor);
					Response::Done
				},
				Request::GetId => Response::Id{id: node.id().clone()},
				Request::Receive{message} => {
					node.receive(message)?;
					Response::Done
				},
				Request::Ping => Response::Pong{alive: node.ping()},
			};
			Ok(response)
		})
	}
}

impl<I: ChordId> RequestHandler<I> for ChordNode<I>{
	fn handle(&self, request: Request<I>) -> BoxFuture<Response<I>> {
		let result = self.dispatch(request);
		Box::pin(async move{
			match result.await {
				Ok(response) => response,
				Err(e) => Response::Error{msg: e.to_string()},
			}
		})
	}
}


/// The Chord itself. This struct acts like a builder in that it is created
/// and modified before being consumed by the start method which then
/// returns another type, ChordHandle.
pub struct Chord<I: ChordId, ADAPTOR: ChordAdaptor<I>>{
	descriptor: NodeDescriptor<I>,
	adaptor: ADAPTOR,
	config: ChordConfig,
	join_list: Vec<NodeDescriptor<I>>,
	join_or_host: bool,
	handler: Option<Arc<dyn MessageHandler>>,
}

impl<I: ChordId, ADAPTOR: ChordAdaptor<I>> Chord<I, ADAPTOR>{

	/// Creates a new Chord instance for the given descriptor. The adaptor
	/// will listen on the descriptor's host and port.
	pub fn new(descriptor: NodeDescriptor<I>, adaptor: ADAPTOR) -> Self{
		Chord{
			descriptor,
			adaptor,
			config: ChordConfig::default(),
			join_list: Vec::new(),
			join_or_host: false,
			handler: None,
		}
	}

	pub fn set_config(&mut self, config: ChordConfig){
		self.config = config;
	}

	/// Set if this chord will default to hosting if the join attempts fail
	pub fn set_join_or_host(&mut self, join_or_host: bool){
		self.join_or_host = join_or_host;
	}

	/// Give the chord a list of nodes to try to join when it starts.
	/// If Some node is passed to start() it will be tried before
	/// these nodes.
	pub fn set_join_list(&mut self, list: Vec<NodeDescriptor<I>>){
		self.join_list = list;
	}

	pub fn set_receive_handler<H: MessageHandler + 'static>(&mut self, handler: H){
		self.handler = Some(Arc::new(handler));
	}

	/// Starts the node. This will take ownership of the Chord and return a ChordHandle.
	///
	/// If passed Some(node) that node will be prepended to the join list.
	/// If the join list has any elements, the node will try to join each of
	/// them in turn, stopping at the first that answers.
	/// If none are reachable, the node will not start unless join_or_host is set.
	/// If the join list is empty, the node will start, implicitly creating a
	/// new chord.
	pub async fn start(self, join: Option<NodeDescriptor<I>>) -> Result<ChordHandle<I>> {
		self.config.validate()?;

		let mut join_list = Vec::new();
		if let Some(node) = join {
			join_list.push(node);
		}
		join_list.extend(self.join_list);

		let adaptor: Arc<dyn ChordAdaptor<I>> = Arc::new(self.adaptor);
		let node = ChordNode::new(self.descriptor, adaptor.clone(), self.config);
		if let Some(handler) = self.handler {
			*node.inner.handler.write() = Some(handler);
		}

		// Start listener task, peers must be able to reach us once we join
		let listener_handle = adaptor.listen(node.descriptor(), Arc::new(node.clone())).await?;

		if !join_list.is_empty() {
			let mut joined = false;
			for bootstrap in join_list.iter() {
				match node.join(bootstrap).await {
					Ok(()) => {
						joined = true;
						break
					},
					// if unreachable, try next node
					Err(e) => warn!("{} could not join through {}: {}", node.name(), bootstrap, e),
				}
			}
			if !joined && !self.join_or_host {
				listener_handle.abort();
				return Err(ChordError::NoBootstrap);
			}
			if !joined {
				info!("{} hosting a new ring", node.name());
			}
		}

		// Start maintenance task
		let maintenance_handle = maintenance::spawn(node.clone());

		Ok(ChordHandle{
			node,
			listener_handle,
			maintenance_handle,
		})
	}
}


/// A ChordHandle represents a started Chord node.
pub struct ChordHandle<I: ChordId>{
	node: ChordNode<I>,
	listener_handle: JoinHandle<()>,
	maintenance_handle: JoinHandle<()>,
}

impl<I: ChordId> ChordHandle<I> {
	pub fn node(&self) -> &ChordNode<I> {
		&self.node
	}

	pub fn status(&self) -> NodeStatus<I> {
		self.node.status()
	}

	/// Force the chord to stop. Peers see the node as unreachable from now on.
	pub async fn stop(self){
		self.listener_handle.abort();
		let _ = self.listener_handle.await;
		self.maintenance_handle.abort();
		let _ = self.maintenance_handle.await;
		info!("{} stopped", self.node.name());
	}
}
