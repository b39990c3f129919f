//! A Chord distributed hash table: nodes on a circular identifier space that
//! route any key to its owner in a logarithmic number of hops and repair the
//! ring on their own as members come and go.


pub mod chord;
pub use chord::{Chord, ChordHandle, ChordNode};
pub use chord::message::{Request, Response, RpcCode};
pub use chord::state::{NodeStatus, Phase};

pub mod adaptor;
pub use adaptor::{ChordAdaptor, memory_adaptor::MemoryAdaptor, tcp_adaptor::TcpAdaptor};

pub mod chord_id;
pub use chord_id::ChordId;

pub mod circular_id;
pub use circular_id::Identifier;

pub mod config;
pub use config::ChordConfig;

pub mod delivery;
pub use delivery::{delivery_channel, DeliveryChannel, MessageHandler};

pub mod error;
pub use error::{ChordError, Result};

pub mod finger_table;

pub mod node;
pub use node::NodeDescriptor;


pub type TCPChord<I> = Chord<I, TcpAdaptor>;

pub type MemoryChord<I> = Chord<I, MemoryAdaptor<I>>;
