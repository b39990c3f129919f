use std::{io::ErrorKind, sync::Arc};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Deserializer, error::Category};
use tokio::{net::{TcpListener, TcpStream}, task::JoinHandle, io::{AsyncWriteExt, AsyncReadExt}, time::{sleep, Duration}};
use tracing::{debug, info, trace, warn};

use super::{encode_frame, ChordAdaptor, RequestHandler};
use crate::{chord::message::{Request, Response}, chord_id::ChordId, config::ChordConfig, error::TransportError, node::NodeDescriptor};

const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// An implementation of ChordAdaptor over TCP. Each call opens a connection
/// to `host:port` of the target, writes one JSON request and reads one JSON
/// reply. Inbound connections may carry any number of requests in sequence.
#[derive(Debug, Clone)]
pub struct TcpAdaptor{
	max_frame_len: usize,
}

impl TcpAdaptor{
	pub fn new() -> Self{
		Self::with_max_frame_len(ChordConfig::default().max_frame_len)
	}

	pub fn with_max_frame_len(max_frame_len: usize) -> Self{
		TcpAdaptor{ max_frame_len }
	}
}

impl Default for TcpAdaptor{
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl<I: ChordId> ChordAdaptor<I> for TcpAdaptor{

	async fn call(&self, target: &NodeDescriptor<I>, request: Request<I>) -> Result<Response<I>, TransportError> {
		let peer = target.address();
		let conn = TcpStream::connect(&peer).await.map_err(|e| TransportError::Unreachable{ peer: peer.clone(), reason: e.to_string() })?;
		let mut stream = TcpChordStream::new(conn, peer.clone(), self.max_frame_len);
		trace!("tcp call {:?} to {}", request.code(), peer);
		stream.write(&request).await?;
		match stream.read::<Response<I>>().await? {
			Some(response) => Ok(response),
			None => Err(TransportError::Malformed{ peer, reason: "connection closed before reply".to_string() }),
		}
	}

	async fn listen(&self, local: &NodeDescriptor<I>, handler: Arc<dyn RequestHandler<I>>) -> Result<JoinHandle<()>, TransportError> {
		let listener = TcpListener::bind((local.host(), local.port())).await?;
		info!("{} listening on {}", local, listener.local_addr()?);
		let max_frame_len = self.max_frame_len;
		Ok(tokio::spawn(async move{
			let mut failures = 0u32;
			loop{
				match listener.accept().await {
					Ok((conn, addr)) => {
						failures = 0;
						let stream = TcpChordStream::new(conn, addr.to_string(), max_frame_len);
						tokio::spawn(serve(stream, handler.clone()));
					},
					Err(e) => {
						// accept errors are per connection (e.g. fd exhaustion), keep listening
						failures = failures.saturating_add(1);
						let delay = accept_backoff(failures);
						warn!("Encountered an error in accept, retrying in {:?}: {}", delay, e);
						sleep(delay).await;
					},
				}
			}
		}))
	}
}

/// Pause before accepting again after `failures` errors in a row: 10ms,
/// doubling up to one second.
fn accept_backoff(failures: u32) -> Duration {
	let exponent = failures.saturating_sub(1).min(7);
	Duration::from_millis(10 << exponent).min(MAX_ACCEPT_BACKOFF)
}

async fn serve<I: ChordId>(mut stream: TcpChordStream, handler: Arc<dyn RequestHandler<I>>){
	loop{
		let response = match stream.read::<Request<I>>().await {
			Ok(Some(request)) => handler.handle(request).await,
			Ok(None) => break,
			Err(e) => {
				debug!("dropping connection from {}: {}", stream.peer, e);
				Response::Error{ msg: e.to_string() }
			},
		};
		let failed = matches!(response, Response::Error{..});
		if let Err(e) = stream.write(&response).await {
			debug!("could not reply to {}: {}", stream.peer, e);
			break;
		}
		if failed && stream.is_poisoned() {
			break;
		}
	}
}


/// A TCP stream carrying back to back JSON values.
struct TcpChordStream{
	stream: TcpStream,
	peer: String,
	buffer: Vec<u8>,
	max_frame_len: usize,
	poisoned: bool,
}

impl TcpChordStream{
	fn new(stream: TcpStream, peer: String, max_frame_len: usize) -> Self{
		Self{
			stream,
			peer,
			buffer: Vec::new(),
			max_frame_len,
			poisoned: false,
		}
	}

	/// Read the next value, or None if the peer closed the connection cleanly.
	async fn read<T: DeserializeOwned>(&mut self) -> Result<Option<T>, TransportError>{
		loop{
			// attempt to deserialize buffer
			let (result, offset) = {
				let mut deserializer = Deserializer::from_slice(self.buffer.as_slice()).into_iter::<T>();
				let result = deserializer.next();
				(result, deserializer.byte_offset())
			};
			match result {
				Some(Ok(msg)) => {
					self.buffer.drain(..offset);
					return Ok(Some(msg));
				},
				// more information may arrive later
				Some(Err(ref e)) if e.classify() == Category::Eof => {},
				Some(Err(e)) => {
					self.poisoned = true;
					return Err(TransportError::Malformed{ peer: self.peer.clone(), reason: e.to_string() });
				},
				// nothing but whitespace so far
				None => self.buffer.clear(),
			}

			if self.buffer.len() > self.max_frame_len {
				self.poisoned = true;
				return Err(TransportError::FrameTooLarge{ len: self.buffer.len(), max: self.max_frame_len });
			}

			// else, read bytes into buffer
			let mut tmp_buf = [0u8; 1024];
			match self.stream.read(&mut tmp_buf).await {
				Ok(0) if self.buffer.is_empty() => return Ok(None),
				Ok(0) => {
					self.poisoned = true;
					return Err(TransportError::Malformed{ peer: self.peer.clone(), reason: "connection closed mid frame".to_string() });
				},
				Ok(len) => self.buffer.extend_from_slice(&tmp_buf[..len]),
				Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
				Err(e) => {
					self.poisoned = true;
					return Err(e.into());
				},
			}
		}
	}

	async fn write<T: Serialize>(&mut self, msg: &T) -> Result<(), TransportError>{
		let raw_data = encode_frame(msg, self.max_frame_len)?;
		self.stream.write_all(&raw_data).await?;
		self.stream.flush().await?;
		Ok(())
	}

	/// True once the stream can no longer be read in step with the peer.
	fn is_poisoned(&self) -> bool {
		self.poisoned
	}
}
