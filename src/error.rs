//! Error types shared by the ring, the transports and the descriptor codec.

use thiserror::Error;

use crate::chord::message::RpcCode;

pub type Result<T, E = ChordError> = std::result::Result<T, E>;

/// Failures of the length-prefixed node descriptor encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescriptorError{
	#[error("{field} is {len} bytes, longer than the 255 byte limit")]
	FieldTooLong{field: &'static str, len: usize},
	#[error("buffer ends before the {field} length byte")]
	MissingLength{field: &'static str},
	#[error("{field} declares {declared} bytes but only {available} remain")]
	Truncated{field: &'static str, declared: usize, available: usize},
	#[error("{0:?} is not a valid port")]
	InvalidPort(String),
	#[error("{field} is not valid utf-8")]
	InvalidUtf8{field: &'static str},
	#[error("{0} unexpected bytes after the descriptor")]
	TrailingBytes(usize),
}

/// Failures to get a reply out of a peer. Every kind means the same thing to
/// the ring: the peer is unreachable for now.
#[derive(Debug, Error)]
pub enum TransportError{
	#[error("{peer} is unreachable: {reason}")]
	Unreachable{peer: String, reason: String},
	#[error("request to {peer} timed out")]
	Timeout{peer: String},
	#[error("malformed frame from {peer}: {reason}")]
	Malformed{peer: String, reason: String},
	#[error("frame of {len} bytes exceeds the {max} byte limit")]
	FrameTooLarge{len: usize, max: usize},
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ChordError{
	#[error("transport failure: {0}")]
	Transport(#[from] TransportError),
	#[error("bad node descriptor: {0}")]
	Descriptor(#[from] DescriptorError),
	#[error("lookup of {id} gave up after {hops} hops")]
	LookupExhausted{id: String, hops: usize},
	#[error("message of {len} bytes exceeds the {max} byte limit")]
	MessageTooLarge{len: usize, max: usize},
	#[error("remote node failed: {0}")]
	Remote(String),
	#[error("unexpected reply to {code:?}: {reply}")]
	UnexpectedResponse{code: RpcCode, reply: String},
	#[error("none of the bootstrap nodes could be joined")]
	NoBootstrap,
	#[error("invalid configuration: {0}")]
	Config(String),
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl ChordError{
	/// True when the failure only says the peer could not be reached, so the
	/// caller should treat it as gone for this cycle and carry on.
	pub fn is_unreachable(&self) -> bool {
		matches!(self, ChordError::Transport(_))
	}
}
