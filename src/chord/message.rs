use serde::{Serialize, Deserialize};

use crate::{chord_id::ChordId, error::{ChordError, Result}, node::NodeDescriptor};


/// Discriminates which ring operation a request invokes. Identical for local
/// and remote dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcCode{
	FindPredecessor,
	FindSuccessor,
	ClosestPrecedingFinger,
	Join,
	Stabilize,
	Notify,
	FixFinger,
	GetPredecessor,
	SetPredecessor,
	GetSuccessor,
	SetSuccessor,
	GetId,
	Receive,
	Ping,
}

impl RpcCode{
	pub const ALL: [RpcCode; 14] = [
		RpcCode::FindPredecessor,
		RpcCode::FindSuccessor,
		RpcCode::ClosestPrecedingFinger,
		RpcCode::Join,
		RpcCode::Stabilize,
		RpcCode::Notify,
		RpcCode::FixFinger,
		RpcCode::GetPredecessor,
		RpcCode::SetPredecessor,
		RpcCode::GetSuccessor,
		RpcCode::SetSuccessor,
		RpcCode::GetId,
		RpcCode::Receive,
		RpcCode::Ping,
	];
}

/// An operation invoked on a node, together with its arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub enum Request<I: ChordId>{
	// Lookup Operations
	FindPredecessor{id: I},
	FindSuccessor{id: I},
	ClosestPrecedingFinger{id: I},

	// Membership Operations
	Join{bootstrap: NodeDescriptor<I>},
	Stabilize,
	Notify{candidate: NodeDescriptor<I>},
	FixFinger,

	// State Operations
	GetPredecessor,
	SetPredecessor{node: Option<NodeDescriptor<I>>},
	GetSuccessor,
	SetSuccessor{node: NodeDescriptor<I>},
	GetId,

	// Other
	Receive{message: String},
	Ping,
}

impl<I: ChordId> Request<I>{
	pub fn code(&self) -> RpcCode {
		match self{
			Request::FindPredecessor{..} => RpcCode::FindPredecessor,
			Request::FindSuccessor{..} => RpcCode::FindSuccessor,
			Request::ClosestPrecedingFinger{..} => RpcCode::ClosestPrecedingFinger,
			Request::Join{..} => RpcCode::Join,
			Request::Stabilize => RpcCode::Stabilize,
			Request::Notify{..} => RpcCode::Notify,
			Request::FixFinger => RpcCode::FixFinger,
			Request::GetPredecessor => RpcCode::GetPredecessor,
			Request::SetPredecessor{..} => RpcCode::SetPredecessor,
			Request::GetSuccessor => RpcCode::GetSuccessor,
			Request::SetSuccessor{..} => RpcCode::SetSuccessor,
			Request::GetId => RpcCode::GetId,
			Request::Receive{..} => RpcCode::Receive,
			Request::Ping => RpcCode::Ping,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub enum Response<I: ChordId>{
	Node{node: NodeDescriptor<I>},
	Predecessor{node: Option<NodeDescriptor<I>>},
	Id{id: I},
	Pong{alive: bool},
	Done,

	Error{msg: String},
}

impl<I: ChordId> Response<I>{
	pub fn into_node(self, code: RpcCode) -> Result<NodeDescriptor<I>> {
		match self{
			Response::Node{node} => Ok(node),
			other => Err(other.unexpected(code)),
		}
	}

	pub fn into_predecessor(self, code: RpcCode) -> Result<Option<NodeDescriptor<I>>> {
		match self{
			Response::Predecessor{node} => Ok(node),
			other => Err(other.unexpected(code)),
		}
	}

	pub fn into_id(self, code: RpcCode) -> Result<I> {
		match self{
			Response::Id{id} => Ok(id),
			other => Err(other.unexpected(code)),
		}
	}

	pub fn into_done(self, code: RpcCode) -> Result<()> {
		match self{
			Response::Done => Ok(()),
			other => Err(other.unexpected(code)),
		}
	}

	fn unexpected(self, code: RpcCode) -> ChordError {
		match self{
			Response::Error{msg} => ChordError::Remote(msg),
			other => ChordError::UnexpectedResponse{ code, reply: format!("{:?}", other) },
		}
	}
}
