use std::{cmp::Ordering, fmt::{Debug, Display}, hash::Hash};
use serde::{Serialize, Deserialize};
use sha1::{Digest, Sha1};

/// A ChordId is a point around the chord ring. It must be able to be compared with other ChordId's, calculate
/// what the ChordId of a finger of given index should be, and measure clockwise distance to another ChordId.
/// Arithmetic wraps at 2^BITS.
pub trait ChordId: Clone + Ord + Hash + Sync + Send + Serialize + for<'de> Deserialize<'de> + 'static + Debug + Display{
	/// Width of the identifier space. The ring holds 2^BITS identifiers and a
	/// finger table holds BITS entries.
	const BITS: u32;

	/// Build an identifier from a big-endian digest, keeping its leading bytes.
	fn from_digest(digest: &[u8]) -> Self;
	/// A uniformly random point on the ring.
	fn random() -> Self;
	/// Clockwise distance from self to `to`, i.e. (to - self) mod 2^BITS.
	fn distance(&self, to: &Self) -> Self;
	/// Calculate the start of finger `index`, i.e. (self + 2^index) mod 2^BITS.
	fn calculate_finger(&self, index: u32) -> Self;

	/// Derive the identifier of a name. One way, and two names may collide.
	fn from_name(name: &str) -> Self {
		Self::from_digest(Sha1::digest(name.as_bytes()).as_slice())
	}

	/// Tests if self is in the range (lower, upper]
	/// When lower == upper the range covers the whole ring.
	fn is_between(&self, lower: &Self, upper: &Self) -> bool {
		match lower.cmp(upper){
			Ordering::Less => (self > lower) && (self <= upper),
			Ordering::Equal => true,
			Ordering::Greater => (self > lower) || (self <= upper),
		}
	}

	/// Tests if self is in the range (lower, upper)
	/// When lower == upper the range is every point except lower.
	fn in_open_interval(&self, lower: &Self, upper: &Self) -> bool {
		match lower.cmp(upper){
			Ordering::Less => (self > lower) && (self < upper),
			Ordering::Equal => self != lower,
			Ordering::Greater => (self > lower) || (self < upper),
		}
	}
}

macro_rules! impl_chord_id {
	($($t:ty),*) => {$(
		impl ChordId for $t{
			const BITS: u32 = <$t>::BITS;

			fn from_digest(digest: &[u8]) -> Self {
				let mut bytes = [0u8; std::mem::size_of::<$t>()];
				let len = bytes.len().min(digest.len());
				bytes[..len].copy_from_slice(&digest[..len]);
				<$t>::from_be_bytes(bytes)
			}
			fn random() -> Self {
				rand::random()
			}
			fn distance(&self, to: &Self) -> Self {
				to.wrapping_sub(*self)
			}
			fn calculate_finger(&self, index :u32) -> Self {
				self.wrapping_add((1 as $t).wrapping_shl(index))
			}
		}
	)*};
}

impl_chord_id!(u8, u16, u32, u64, u128);


#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn open_interval_wraps_around_zero() {
		// (250, 10) on a ring of 2^8
		assert!(255u8.in_open_interval(&250, &10));
		assert!(5u8.in_open_interval(&250, &10));
		assert!(0u8.in_open_interval(&250, &10));
		assert!(!100u8.in_open_interval(&250, &10));
	}

	#[test]
	fn open_interval_excludes_both_ends() {
		assert!(!250u8.in_open_interval(&250, &10));
		assert!(!10u8.in_open_interval(&250, &10));
		assert!(!10u8.in_open_interval(&10, &20));
		assert!(!20u8.in_open_interval(&10, &20));
		assert!(11u8.in_open_interval(&10, &20));
		assert!(19u8.in_open_interval(&10, &20));
	}

	#[test]
	fn half_open_interval_includes_upper_end() {
		assert!(10u8.is_between(&250, &10));
		assert!(!250u8.is_between(&250, &10));
		assert!(20u8.is_between(&10, &20));
		assert!(!10u8.is_between(&10, &20));
		assert!(!21u8.is_between(&10, &20));
	}

	#[test]
	fn degenerate_intervals() {
		// a node alone on the ring owns everything
		assert!(7u8.is_between(&42, &42));
		assert!(42u8.is_between(&42, &42));
		// but nothing lies strictly between it and itself except the other points
		assert!(7u8.in_open_interval(&42, &42));
		assert!(!42u8.in_open_interval(&42, &42));
	}

	#[test]
	fn distance_is_clockwise() {
		assert_eq!(10u8.distance(&20), 10);
		assert_eq!(250u8.distance(&10), 16);
		assert_eq!(20u8.distance(&10), 246);
		assert_eq!(7u8.distance(&7), 0);
	}

	#[test]
	fn fingers_wrap() {
		assert_eq!(250u8.calculate_finger(0), 251);
		assert_eq!(250u8.calculate_finger(3), 2);
		assert_eq!(0u8.calculate_finger(7), 128);
		assert_eq!(u64::MAX.calculate_finger(0), 0);
	}

	#[test]
	fn names_hash_deterministically() {
		assert_eq!(u64::from_name("alice"), u64::from_name("alice"));
		assert_ne!(u64::from_name("alice"), u64::from_name("bob"));
		// narrower ids keep the leading digest bytes
		let wide = u32::from_name("alice");
		assert_eq!(u16::from_name("alice"), (wide >> 16) as u16);
	}
}
