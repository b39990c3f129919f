use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use super::{state::Phase, ChordNode};
use crate::{chord_id::ChordId, error::Result, node::NodeDescriptor};


impl<I: ChordId> ChordNode<I>{

	/// Verify the successor and tell it about this node.
	/// Sequence: get_predecessor(successor) -> maybe adopt it -> notify(successor)
	#[instrument(skip(self), fields(node = %self.name()))]
	pub async fn stabilize(&self) -> Result<()> {
		let mut successor = self.get_successor();

		let candidate = match self.remote_get_predecessor(&successor).await {
			Ok(candidate) => candidate,
			Err(e) if e.is_unreachable() => {
				warn!("successor {} unreachable: {}", successor, e);
				successor = self.replace_successor(&successor).await;
				None
			},
			Err(e) => return Err(e),
		};

		if let Some(candidate) = candidate {
			if candidate.id().in_open_interval(self.id(), successor.id()) && self.ping_node(&candidate).await {
				if self.adopt_successor(&successor, candidate.clone()) {
					successor = candidate;
				}
			}
		}

		if successor != *self.descriptor() {
			match self.remote_notify(&successor).await {
				Ok(()) => {},
				// picked up again next cycle
				Err(e) if e.is_unreachable() => debug!("could not notify {}: {}", successor, e),
				Err(e) => return Err(e),
			}
		}

		let mut state = self.inner.state.lock();
		state.stabilized_at = Some(Utc::now());
		state.phase = if state.successor == *self.descriptor() { Phase::Solo } else { Phase::Stable };
		Ok(())
	}

	/// Swap the successor for `node`, unless someone else changed it since it
	/// was read as `expected`.
	fn adopt_successor(&self, expected: &NodeDescriptor<I>, node: NodeDescriptor<I>) -> bool {
		let mut state = self.inner.state.lock();
		if state.successor != *expected {
			return false;
		}
		if state.successor != node {
			info!("{} adopting successor {}", self.name(), node);
			state.set_successor(node);
		}
		true
	}

	/// Find a stand in for a successor that stopped answering: the nearest
	/// known node that answers a ping, or this node when nobody does.
	async fn replace_successor(&self, lost: &NodeDescriptor<I>) -> NodeDescriptor<I> {
		let candidates = {
			let mut state = self.inner.state.lock();
			state.forget(lost);
			state.successor_candidates(self.descriptor(), lost)
		};
		for candidate in candidates {
			if self.ping_node(&candidate).await {
				self.adopt_successor(lost, candidate);
				return self.get_successor();
			}
			self.forget(&candidate);
		}
		self.adopt_successor(lost, self.descriptor().clone());
		self.get_successor()
	}

	/// `candidate` thinks it might be this node's predecessor.
	#[instrument(skip(self), fields(node = %self.name()))]
	pub async fn notify(&self, candidate: NodeDescriptor<I>) -> Result<()> {
		if candidate == *self.descriptor() {
			return Ok(());
		}

		let current = self.get_predecessor();
		let adopt = match &current {
			None => true,
			Some(predecessor) if *predecessor == candidate => false,
			Some(predecessor) if candidate.id().in_open_interval(predecessor.id(), self.id()) => true,
			Some(predecessor) => !self.ping_node(predecessor).await,
		};
		if !adopt {
			return Ok(());
		}

		let mut state = self.inner.state.lock();
		if state.predecessor == current {
			info!("{} adopting predecessor {}", self.name(), candidate);
			state.predecessor = Some(candidate);
		}
		Ok(())
	}

	/// Refresh the next finger in round robin order.
	#[instrument(skip(self), fields(node = %self.name()))]
	pub async fn fix_fingers(&self) -> Result<()> {
		let (index, start) = {
			let mut state = self.inner.state.lock();
			let index = state.fingers.next_fix_index();
			(index, state.fingers.start(index))
		};
		let finger = self.find_successor(&start).await?;
		self.inner.state.lock().fingers.set(index, finger);
		Ok(())
	}

	/// Clear the predecessor if it no longer answers.
	pub async fn check_predecessor(&self) -> Result<()> {
		if let Some(predecessor) = self.get_predecessor() {
			if !self.ping_node(&predecessor).await {
				warn!("{} lost predecessor {}", self.name(), predecessor);
				self.forget(&predecessor);
			}
		}
		Ok(())
	}

	/// Drop every reference to an unreachable node except the successor.
	pub(crate) fn forget(&self, node: &NodeDescriptor<I>) {
		self.inner.state.lock().forget(node);
	}
}
