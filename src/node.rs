use std::{fmt, hash::{Hash, Hasher}, marker::PhantomData};

use serde::{
	ser::{Serialize, Serializer},
	de::{self, Deserialize, Deserializer, SeqAccess, Visitor},
};

use crate::{chord_id::ChordId, error::DescriptorError};

/// Longest name or host a descriptor can carry; lengths travel as one byte.
pub const MAX_FIELD_LEN: usize = 255;

/// Identifies a ring member. The id is always the hash of the name, and two
/// descriptors are equal exactly when their ids are.
#[derive(Clone, Debug)]
pub struct NodeDescriptor<I: ChordId>{
	name: String,
	host: String,
	port: u16,
	id: I,
}

impl<I: ChordId> NodeDescriptor<I> {
	pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Result<Self, DescriptorError>{
		let name = name.into();
		let host = host.into();
		check_len("name", &name)?;
		check_len("host", &host)?;
		let id = I::from_name(&name);
		Ok(NodeDescriptor{ name, host, port, id })
	}

	pub fn id(&self) -> &I {
		&self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	/// `host:port`, the address a transport connects to.
	pub fn address(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	/// Encode as `nameLen name hostLen host portLen port`, with the port as
	/// decimal ASCII and every length a single byte.
	pub fn encode(&self) -> Vec<u8> {
		let port = self.port.to_string();
		let mut out = Vec::with_capacity(3 + self.name.len() + self.host.len() + port.len());
		for field in [self.name.as_bytes(), self.host.as_bytes(), port.as_bytes()] {
			// lengths were checked on construction
			out.push(field.len() as u8);
			out.extend_from_slice(field);
		}
		out
	}

	/// Decode a buffer holding exactly one descriptor.
	pub fn decode(buf: &[u8]) -> Result<Self, DescriptorError>{
		let (descriptor, used) = Self::decode_prefix(buf)?;
		if used != buf.len() {
			return Err(DescriptorError::TrailingBytes(buf.len() - used));
		}
		Ok(descriptor)
	}

	/// Decode one descriptor from the front of `buf`, returning it with the
	/// number of bytes it occupied.
	pub fn decode_prefix(buf: &[u8]) -> Result<(Self, usize), DescriptorError>{
		let mut reader = FieldReader{ buf, pos: 0 };
		let name = reader.text("name")?;
		let host = reader.text("host")?;
		let port = reader.text("port")?;
		if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
			return Err(DescriptorError::InvalidPort(port.to_string()));
		}
		let port = port.parse::<u16>().map_err(|_| DescriptorError::InvalidPort(port.to_string()))?;
		let descriptor = NodeDescriptor::new(name, host, port)?;
		Ok((descriptor, reader.pos))
	}
}

fn check_len(field: &'static str, value: &str) -> Result<(), DescriptorError>{
	if value.len() > MAX_FIELD_LEN {
		return Err(DescriptorError::FieldTooLong{ field, len: value.len() });
	}
	Ok(())
}

struct FieldReader<'a>{
	buf: &'a [u8],
	pos: usize,
}

impl<'a> FieldReader<'a>{
	fn field(&mut self, field: &'static str) -> Result<&'a [u8], DescriptorError>{
		let len = *self.buf.get(self.pos).ok_or(DescriptorError::MissingLength{ field })? as usize;
		self.pos += 1;
		let available = self.buf.len() - self.pos;
		if len > available {
			return Err(DescriptorError::Truncated{ field, declared: len, available });
		}
		let bytes = &self.buf[self.pos..self.pos + len];
		self.pos += len;
		Ok(bytes)
	}

	fn text(&mut self, field: &'static str) -> Result<&'a str, DescriptorError>{
		let bytes = self.field(field)?;
		std::str::from_utf8(bytes).map_err(|_| DescriptorError::InvalidUtf8{ field })
	}
}

impl<I: ChordId> PartialEq for NodeDescriptor<I>{
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl<I: ChordId> Eq for NodeDescriptor<I>{}

impl<I: ChordId> Hash for NodeDescriptor<I>{
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl<I: ChordId> fmt::Display for NodeDescriptor<I>{
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}@{}:{}", self.name, self.host, self.port)
	}
}

// On the wire a descriptor is its compact encoding; the id is recomputed.
impl<I: ChordId> Serialize for NodeDescriptor<I>{
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_bytes(&self.encode())
	}
}

struct DescriptorVisitor<I>(PhantomData<I>);

impl<'de, I: ChordId> Visitor<'de> for DescriptorVisitor<I>{
	type Value = NodeDescriptor<I>;

	fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
		formatter.write_str("a length-prefixed node descriptor")
	}

	fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
		NodeDescriptor::decode(v).map_err(E::custom)
	}

	fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
	where
		S: SeqAccess<'de>,
	{
		let mut bytes: Vec<u8> = Vec::with_capacity(seq.size_hint().unwrap_or(0));
		while let Some(b) = seq.next_element()? {
			bytes.push(b);
		}
		NodeDescriptor::decode(&bytes).map_err(de::Error::custom)
	}
}

impl<'de, I: ChordId> Deserialize<'de> for NodeDescriptor<I>{
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		deserializer.deserialize_bytes(DescriptorVisitor(PhantomData))
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encoding_layout() {
		let node = NodeDescriptor::<u32>::new("ab", "h", 80).expect("descriptor");
		assert_eq!(node.encode(), b"\x02ab\x01h\x0280".to_vec());
	}

	#[test]
	fn round_trip_at_field_boundaries() {
		let long = "x".repeat(MAX_FIELD_LEN);
		for (name, host) in [("", ""), (long.as_str(), long.as_str()), ("alice", "")] {
			let node = NodeDescriptor::<u64>::new(name, host, 65535).expect("descriptor");
			let back = NodeDescriptor::<u64>::decode(&node.encode()).expect("decode");
			assert_eq!((back.name(), back.host(), back.port()), (name, host, 65535));
			assert_eq!(back.id(), node.id());
		}
	}

	#[test]
	fn oversized_fields_are_refused() {
		let long = "x".repeat(MAX_FIELD_LEN + 1);
		assert_eq!(
			NodeDescriptor::<u64>::new(long.as_str(), "h", 1).unwrap_err(),
			DescriptorError::FieldTooLong{ field: "name", len: 256 }
		);
		assert!(NodeDescriptor::<u64>::new("n", long, 1).is_err());
	}

	#[test]
	fn declared_length_past_the_buffer_is_rejected() {
		// nameLen says 200 but only 3 bytes follow
		let buf = b"\xc8abc";
		assert_eq!(
			NodeDescriptor::<u64>::decode(buf).unwrap_err(),
			DescriptorError::Truncated{ field: "name", declared: 200, available: 3 }
		);
		// host length byte missing entirely
		assert_eq!(
			NodeDescriptor::<u64>::decode(b"\x01a").unwrap_err(),
			DescriptorError::MissingLength{ field: "host" }
		);
		assert!(NodeDescriptor::<u64>::decode(b"").is_err());
	}

	#[test]
	fn bad_ports_are_rejected() {
		assert!(matches!(NodeDescriptor::<u64>::decode(b"\x01a\x01h\x0599999"), Err(DescriptorError::InvalidPort(_))));
		assert!(matches!(NodeDescriptor::<u64>::decode(b"\x01a\x01h\x02+1"), Err(DescriptorError::InvalidPort(_))));
		assert!(matches!(NodeDescriptor::<u64>::decode(b"\x01a\x01h\x00"), Err(DescriptorError::InvalidPort(_))));
	}

	#[test]
	fn trailing_bytes_only_allowed_with_prefix_decoding() {
		let mut buf = NodeDescriptor::<u64>::new("a", "h", 7).expect("descriptor").encode();
		let len = buf.len();
		buf.extend_from_slice(b"rest");
		assert_eq!(NodeDescriptor::<u64>::decode(&buf).unwrap_err(), DescriptorError::TrailingBytes(4));
		let (node, used) = NodeDescriptor::<u64>::decode_prefix(&buf).expect("prefix");
		assert_eq!(used, len);
		assert_eq!(node.name(), "a");
	}

	#[test]
	fn equality_is_by_id_only() {
		let a = NodeDescriptor::<u64>::new("alice", "10.0.0.1", 1).expect("descriptor");
		let moved = NodeDescriptor::<u64>::new("alice", "10.0.0.2", 2).expect("descriptor");
		let b = NodeDescriptor::<u64>::new("bob", "10.0.0.1", 1).expect("descriptor");
		assert_eq!(a, moved);
		assert_ne!(a, b);
	}

	#[test]
	fn serde_carries_the_compact_encoding() {
		let node = NodeDescriptor::<u64>::new("alice", "localhost", 4000).expect("descriptor");
		let json = serde_json::to_vec(&node).expect("serialize");
		let back: NodeDescriptor<u64> = serde_json::from_slice(&json).expect("deserialize");
		assert_eq!(back.address(), "localhost:4000");
		assert_eq!(back, node);
	}
}
