mod common;

use chord_ring::{delivery_channel, chord::ChordHandle, NodeDescriptor, TCPChord, TcpAdaptor};
use tokio::time::Duration;

use common::manual_config;


fn free_port() -> u16 {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind to an ephemeral port");
	listener.local_addr().expect("local address").port()
}

async fn start(name: &str, join: Option<NodeDescriptor<u64>>) -> ChordHandle<u64> {
	let descriptor = NodeDescriptor::new(name, "127.0.0.1", free_port()).expect("descriptor");
	let mut chord = TCPChord::new(descriptor, TcpAdaptor::new());
	chord.set_config(manual_config());
	chord.start(join).await.expect("Chords should be able to start")
}

#[tokio::test]
async fn two_nodes_over_tcp() {
	let first = start("tcp-one", None).await;
	let second = start("tcp-two", Some(first.node().descriptor().clone())).await;
	assert_eq!(second.status().successor, *first.node().descriptor());

	for _ in 0..3 {
		second.node().stabilize().await.expect("stabilize");
		first.node().stabilize().await.expect("stabilize");
	}
	assert_eq!(first.status().successor, *second.node().descriptor());
	assert_eq!(first.status().predecessor.as_ref(), Some(second.node().descriptor()));
	assert_eq!(second.status().successor, *first.node().descriptor());
	assert_eq!(second.status().predecessor.as_ref(), Some(first.node().descriptor()));

	let id = first.node().remote_get_id(second.node().descriptor()).await.expect("GET_ID over tcp");
	assert_eq!(id, *second.node().id());

	let (handler, mut inbox) = delivery_channel();
	second.node().set_receive_handler(handler);
	let owner = first.node().send(second.node().id(), "over the wire".to_string()).await.expect("send");
	assert_eq!(owner, *second.node().descriptor());
	assert_eq!(inbox.recv_timeout(Duration::from_secs(2)).await.as_deref(), Some("over the wire"));

	let gone = second.node().descriptor().clone();
	second.stop().await;
	assert!(!first.node().ping_node(&gone).await);
	first.node().stabilize().await.expect("stabilize after loss");
	assert_eq!(first.status().successor, *first.node().descriptor());

	first.stop().await;
}
