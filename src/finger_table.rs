use crate::{chord_id::ChordId, node::NodeDescriptor};

/// Routing shortcuts of one node. Entry `i` holds the node believed to own
/// `owner + 2^i`; entry 0 is the successor. Entries may be stale or empty
/// between refreshes, but a filled entry always names a real ring member.
#[derive(Debug, Clone)]
pub struct FingerTable<I: ChordId>{
	owner: I,
	fingers: Vec<Option<NodeDescriptor<I>>>,
	fix_index: u32,
}

impl<I: ChordId> FingerTable<I>{
	/// A table for a node alone on the ring: its successor is itself.
	pub fn new(owner: &NodeDescriptor<I>) -> Self {
		let mut fingers = vec![None; I::BITS as usize];
		fingers[0] = Some(owner.clone());
		FingerTable{
			owner: owner.id().clone(),
			fingers,
			fix_index: 0,
		}
	}

	/// The identifier finger `index` is responsible for.
	pub fn start(&self, index: u32) -> I {
		self.owner.calculate_finger(index)
	}

	pub fn get(&self, index: u32) -> Option<&NodeDescriptor<I>> {
		self.fingers.get(index as usize).and_then(Option::as_ref)
	}

	pub fn set(&mut self, index: u32, node: NodeDescriptor<I>) {
		match self.fingers.get_mut(index as usize){
			Some(entry) => *entry = Some(node),
			None => tracing::error!("finger index {} out of range", index),
		}
	}

	pub fn len(&self) -> usize {
		self.fingers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fingers.is_empty()
	}

	/// Calculate the next index to refresh. Entry 0 is kept by stabilize, so
	/// this cycles through 1..BITS and wraps back to one.
	pub fn next_fix_index(&mut self) -> u32 {
		let mut next_index = self.fix_index + 1;
		if next_index >= I::BITS {
			next_index = 1;
		}
		self.fix_index = next_index;
		next_index
	}

	/// The farthest finger lying strictly between the owner and `id`.
	pub fn closest_preceding(&self, id: &I) -> Option<&NodeDescriptor<I>> {
		self.fingers
			.iter()
			.rev()
			.flatten()
			.find(|finger| finger.id().in_open_interval(&self.owner, id))
	}

	/// Drop every entry after the successor that points at `node`.
	pub fn evict(&mut self, node: &NodeDescriptor<I>) {
		for entry in self.fingers.iter_mut().skip(1) {
			if entry.as_ref() == Some(node) {
				*entry = None;
			}
		}
	}

	/// Forget every entry after the successor.
	pub fn reset(&mut self) {
		for entry in self.fingers.iter_mut().skip(1) {
			*entry = None;
		}
		self.fix_index = 0;
	}

	/// Distinct nodes named by the table, nearest finger first.
	pub fn nodes(&self) -> Vec<NodeDescriptor<I>> {
		let mut nodes: Vec<NodeDescriptor<I>> = Vec::new();
		for finger in self.fingers.iter().flatten() {
			if !nodes.contains(finger) {
				nodes.push(finger.clone());
			}
		}
		nodes
	}

	pub fn entries(&self) -> &[Option<NodeDescriptor<I>>] {
		&self.fingers
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	/// Descriptor whose id is forced, bypassing name hashing.
	fn node_at(id: u8) -> NodeDescriptor<u8> {
		// search for a name hashing to the wanted id
		(0..100_000)
			.map(|i| format!("n{}", i))
			.find(|name| u8::from_name(name) == id)
			.map(|name| NodeDescriptor::new(name, "h", 1).expect("descriptor"))
			.expect("some name hashes to every u8")
	}

	#[test]
	fn starts_alone() {
		let owner = node_at(10);
		let table = FingerTable::new(&owner);
		assert_eq!(table.len(), 8);
		assert_eq!(table.get(0), Some(&owner));
		assert_eq!(table.get(1), None);
		assert_eq!(table.start(0), 11);
		assert_eq!(table.start(7), 138);
		// a lone owner is never a preceding finger
		assert_eq!(table.closest_preceding(&200), None);
	}

	#[test]
	fn closest_preceding_prefers_the_farthest_finger() {
		let owner = node_at(10);
		let mut table = FingerTable::new(&owner);
		table.set(0, node_at(20));
		table.set(4, node_at(30));
		table.set(6, node_at(80));
		table.set(7, node_at(150));

		assert_eq!(table.closest_preceding(&100).map(|n| *n.id()), Some(80));
		assert_eq!(table.closest_preceding(&80).map(|n| *n.id()), Some(30));
		assert_eq!(table.closest_preceding(&25).map(|n| *n.id()), Some(20));
		assert_eq!(table.closest_preceding(&15), None);
		// wrapping past zero
		assert_eq!(table.closest_preceding(&5).map(|n| *n.id()), Some(150));
	}

	#[test]
	fn fix_index_skips_the_successor() {
		let mut table = FingerTable::new(&node_at(1));
		let order: Vec<u32> = (0..9).map(|_| table.next_fix_index()).collect();
		assert_eq!(order, vec![1, 2, 3, 4, 5, 6, 7, 1, 2]);
	}

	#[test]
	fn evict_keeps_the_successor_entry() {
		let owner = node_at(10);
		let dead = node_at(40);
		let mut table = FingerTable::new(&owner);
		table.set(0, dead.clone());
		table.set(3, dead.clone());
		table.set(5, node_at(60));
		table.evict(&dead);
		assert_eq!(table.get(0), Some(&dead));
		assert_eq!(table.get(3), None);
		assert_eq!(table.nodes().len(), 2);
		table.reset();
		assert_eq!(table.nodes(), vec![dead]);
	}
}
