#![allow(dead_code)]

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use chord_ring::{
	adaptor::RequestHandler, chord::ChordHandle, error::TransportError, Chord, ChordAdaptor, ChordConfig, ChordId,
	MemoryAdaptor, MemoryChord, NodeDescriptor, Request, Response,
};
use parking_lot::Mutex;
use tokio::{task::JoinHandle, time::{sleep, Duration, Instant}};


/// Maintenance slow enough that tests drive every cycle by hand.
pub fn manual_config() -> ChordConfig {
	ChordConfig{
		stabilize_interval_ms: 3_600_000,
		fix_fingers_interval_ms: 3_600_000,
		check_predecessor_interval_ms: 3_600_000,
		rpc_timeout_ms: 500,
		..ChordConfig::default()
	}
}

pub fn descriptor(name: &str, port: u16) -> NodeDescriptor<u64> {
	NodeDescriptor::new(name, "mem", port).expect("valid descriptor")
}

pub async fn start_node(network: &MemoryAdaptor<u64>, name: &str, port: u16, config: ChordConfig, join: Option<NodeDescriptor<u64>>) -> ChordHandle<u64> {
	let mut chord = MemoryChord::new(descriptor(name, port), network.clone());
	chord.set_config(config);
	chord.start(join).await.expect("Chords should be able to start")
}

/// Start one node per name on a shared network, each joining through the
/// node started before it.
pub async fn make_nodes(network: &MemoryAdaptor<u64>, names: &[&str], config: ChordConfig) -> Vec<ChordHandle<u64>> {
	let mut v: Vec<ChordHandle<u64>> = Vec::new();
	for (i, name) in names.iter().enumerate() {
		let join = v.last().map(|previous| previous.node().descriptor().clone());
		v.push(start_node(network, name, 1000 + i as u16, config.clone(), join).await);
	}
	v
}

/// Run stabilize on every node `rounds` times, then refresh every finger.
pub async fn converge(handles: &[ChordHandle<u64>], rounds: usize) {
	stabilize_all(handles, rounds).await;
	let bits = <u64 as ChordId>::BITS;
	for handle in handles {
		for _ in 1..bits {
			let _ = handle.node().fix_fingers().await;
		}
	}
	stabilize_all(handles, 1).await;
}

pub async fn stabilize_all(handles: &[ChordHandle<u64>], rounds: usize) {
	for _ in 0..rounds {
		for handle in handles {
			let _ = handle.node().stabilize().await;
		}
	}
}

/// Positions of `handles` ordered by identifier.
pub fn id_order(handles: &[ChordHandle<u64>]) -> Vec<usize> {
	let mut order: Vec<usize> = (0..handles.len()).collect();
	order.sort_by_key(|&i| *handles[i].node().id());
	order
}

/// True when successors and predecessors follow identifier order around a
/// single cycle.
pub fn ring_is_ordered(handles: &[ChordHandle<u64>]) -> bool {
	let order = id_order(handles);
	let n = order.len();
	(0..n).all(|k| {
		let status = handles[order[k]].status();
		let next = handles[order[(k + 1) % n]].node().descriptor();
		let previous = handles[order[(k + n - 1) % n]].node().descriptor();
		status.successor == *next && status.predecessor.as_ref() == Some(previous)
	})
}

/// Poll until the ring is ordered or `limit` passes.
pub async fn wait_for_ring(handles: &[ChordHandle<u64>], limit: Duration) -> bool {
	let deadline = Instant::now() + limit;
	while Instant::now() < deadline {
		if ring_is_ordered(handles) {
			return true;
		}
		sleep(Duration::from_millis(20)).await;
	}
	ring_is_ordered(handles)
}


/// A memory network on which chosen addresses stop answering without
/// refusing: calls to them never complete, so only the RPC timeout ends them.
#[derive(Clone)]
pub struct StallingAdaptor{
	network: MemoryAdaptor<u64>,
	stalled: Arc<Mutex<HashSet<String>>>,
}

impl StallingAdaptor{
	pub fn new(network: &MemoryAdaptor<u64>) -> Self{
		StallingAdaptor{
			network: network.clone(),
			stalled: Arc::new(Mutex::new(HashSet::new())),
		}
	}

	pub fn stall(&self, node: &NodeDescriptor<u64>) {
		self.stalled.lock().insert(node.address());
	}
}

#[async_trait]
impl ChordAdaptor<u64> for StallingAdaptor{
	async fn call(&self, target: &NodeDescriptor<u64>, request: Request<u64>) -> Result<Response<u64>, TransportError> {
		let stalled = self.stalled.lock().contains(&target.address());
		if stalled {
			std::future::pending::<()>().await;
		}
		self.network.call(target, request).await
	}

	async fn listen(&self, local: &NodeDescriptor<u64>, handler: Arc<dyn RequestHandler<u64>>) -> Result<JoinHandle<()>, TransportError> {
		self.network.listen(local, handler).await
	}
}

/// `make_nodes` over a stalling network.
pub async fn make_stalling_nodes(adaptor: &StallingAdaptor, names: &[&str], config: ChordConfig) -> Vec<ChordHandle<u64>> {
	let mut v: Vec<ChordHandle<u64>> = Vec::new();
	for (i, name) in names.iter().enumerate() {
		let join = v.last().map(|previous| previous.node().descriptor().clone());
		let mut chord = Chord::new(descriptor(name, 2000 + i as u16), adaptor.clone());
		chord.set_config(config.clone());
		v.push(chord.start(join).await.expect("Chords should be able to start"));
	}
	v
}
