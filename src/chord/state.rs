use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{chord_id::ChordId, finger_table::FingerTable, node::NodeDescriptor};


/// Where a node stands in its lifecycle. There is no leaving phase: a node
/// that goes away is noticed by its peers failing to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase{
	/// The node is its own successor.
	Solo,
	/// Joined through a bootstrap node, waiting for the first stabilize.
	Joining,
	Stable,
}

/// The mutable pointers of a node. Always accessed under the node's lock, and
/// the lock is never held across a call to another node.
#[derive(Debug)]
pub(crate) struct RingState<I: ChordId>{
	pub predecessor: Option<NodeDescriptor<I>>,
	pub successor: NodeDescriptor<I>,
	pub fingers: FingerTable<I>,
	pub phase: Phase,
	pub stabilized_at: Option<DateTime<Utc>>,
}

impl<I: ChordId> RingState<I> {
	pub fn new(own: &NodeDescriptor<I>) -> Self {
		RingState {
			predecessor: None,
			successor: own.clone(),
			fingers: FingerTable::new(own),
			phase: Phase::Solo,
			stabilized_at: None,
		}
	}

	/// Replace the successor, keeping finger 0 in step with it.
	pub fn set_successor(&mut self, node: NodeDescriptor<I>) {
		self.fingers.set(0, node.clone());
		self.successor = node;
	}

	/// Drop a node known to be unreachable from everything but the successor
	/// pointer, which only stabilize replaces.
	pub fn forget(&mut self, node: &NodeDescriptor<I>) {
		if self.predecessor.as_ref() == Some(node) {
			self.predecessor = None;
		}
		self.fingers.evict(node);
	}

	/// Nodes that could stand in for a lost successor, nearest first.
	pub fn successor_candidates(&self, own: &NodeDescriptor<I>, lost: &NodeDescriptor<I>) -> Vec<NodeDescriptor<I>> {
		let mut candidates: Vec<NodeDescriptor<I>> = self.fingers.nodes();
		if let Some(predecessor) = &self.predecessor {
			if !candidates.contains(predecessor) {
				candidates.push(predecessor.clone());
			}
		}
		candidates.retain(|c| c != own && c != lost);
		candidates.sort_by_key(|c| own.id().distance(c.id()));
		candidates
	}

	pub fn snapshot(&self, own: &NodeDescriptor<I>) -> NodeStatus<I> {
		NodeStatus {
			node: own.clone(),
			predecessor: self.predecessor.clone(),
			successor: self.successor.clone(),
			fingers: self.fingers.entries().to_vec(),
			phase: self.phase,
			stabilized_at: self.stabilized_at,
		}
	}
}

/// A point in time copy of a node's pointers.
#[derive(Debug, Clone)]
pub struct NodeStatus<I: ChordId>{
	pub node: NodeDescriptor<I>,
	pub predecessor: Option<NodeDescriptor<I>>,
	pub successor: NodeDescriptor<I>,
	pub fingers: Vec<Option<NodeDescriptor<I>>>,
	pub phase: Phase,
	pub stabilized_at: Option<DateTime<Utc>>,
}

impl<I: ChordId> NodeStatus<I> {
	/// True if this node owns `id`, i.e. `id` lies in (predecessor, self].
	/// Without a predecessor a node claims the whole ring.
	pub fn owns(&self, id: &I) -> bool {
		match &self.predecessor {
			Some(predecessor) => id.is_between(predecessor.id(), self.node.id()),
			None => true,
		}
	}
}

impl<I: ChordId> fmt::Display for NodeStatus<I> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		writeln!(f, "node {} id {} ({:?})", self.node, self.node.id(), self.phase)?;
		match &self.predecessor {
			Some(p) => writeln!(f, "  predecessor: {} id {}", p, p.id())?,
			None => writeln!(f, "  predecessor: none")?,
		}
		writeln!(f, "  successor: {} id {}", self.successor, self.successor.id())?;
		if let Some(at) = self.stabilized_at {
			writeln!(f, "  last stabilized: {}", at.to_rfc3339())?;
		}
		// consecutive fingers usually name the same node, print each run once
		let mut index = 0;
		while index < self.fingers.len() {
			let entry = &self.fingers[index];
			let mut end = index;
			while end + 1 < self.fingers.len() && &self.fingers[end + 1] == entry {
				end += 1;
			}
			if let Some(finger) = entry {
				writeln!(f, "  finger {}..={}: {}", index, end, finger)?;
			}
			index = end + 1;
		}
		Ok(())
	}
}
