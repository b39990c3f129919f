use std::time::Duration;

use tokio::{sync::mpsc::{unbounded_channel, UnboundedReceiver}, time::timeout};
use tracing::debug;


/// Receives payloads routed to this node. Called synchronously, exactly once
/// per delivered message, and never retried.
pub trait MessageHandler: Send + Sync{
	fn deliver(&self, message: String);
}

impl<F: Fn(String) + Send + Sync> MessageHandler for F{
	fn deliver(&self, message: String) {
		self(message)
	}
}

/// Receiving half of a delivery channel.
pub struct DeliveryChannel{
	from: UnboundedReceiver<String>,
}

/// Create a handler that forwards every delivered message into a channel, and
/// the channel an application reads them from.
pub fn delivery_channel() -> (impl MessageHandler, DeliveryChannel){
	let (to, from) = unbounded_channel();
	let handler = move |message: String| {
		if to.send(message).is_err() {
			debug!("delivery channel closed, dropping message");
		}
	};
	(handler, DeliveryChannel{ from })
}

impl DeliveryChannel{
	pub async fn recv(&mut self) -> Option<String> {
		self.from.recv().await
	}

	/// Wait up to `limit` for the next message.
	pub async fn recv_timeout(&mut self, limit: Duration) -> Option<String> {
		match timeout(limit, self.from.recv()).await {
			Ok(message) => message,
			Err(_) => None,
		}
	}

	/// Take a message if one is already waiting.
	pub fn try_recv(&mut self) -> Option<String> {
		self.from.try_recv().ok()
	}
}
