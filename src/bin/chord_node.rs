use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chord_ring::{ChordConfig, Identifier, NodeDescriptor, TCPChord, TcpAdaptor};
use clap::Parser;
use tokio::time::{interval, Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(about, version)]
pub struct Args {
	/// Name of this node; its identifier is the hash of the name.
	pub name: String,
	#[clap(long, default_value = "127.0.0.1")]
	pub host: String,
	#[clap(long, short = 'p')]
	pub port: u16,
	/// Bootstrap node as name@host:port. May be repeated.
	#[clap(long, short = 'j')]
	pub join: Vec<String>,
	/// Host a new ring if none of the bootstrap nodes answer.
	#[clap(long)]
	pub join_or_host: bool,
	/// JSON config file.
	#[clap(long, short = 'c')]
	pub config: Option<PathBuf>,
	/// Seconds between status dumps.
	#[clap(long, default_value_t = 30)]
	pub status_every: u64,
}

fn parse_peer(peer: &str) -> Result<NodeDescriptor<Identifier>> {
	let (name, address) = peer.split_once('@').ok_or_else(|| anyhow!("expected name@host:port, got {:?}", peer))?;
	let (host, port) = address.rsplit_once(':').ok_or_else(|| anyhow!("missing port in {:?}", peer))?;
	let port = port.parse().with_context(|| format!("bad port in {:?}", peer))?;
	Ok(NodeDescriptor::new(name, host, port)?)
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let args = Args::parse();
	let config = match &args.config {
		Some(path) => ChordConfig::from_file(path).await.with_context(|| format!("loading {}", path.display()))?,
		None => ChordConfig::default(),
	};
	let join_list = args.join.iter().map(|peer| parse_peer(peer)).collect::<Result<Vec<_>>>()?;

	let descriptor = NodeDescriptor::<Identifier>::new(args.name.as_str(), args.host.as_str(), args.port)?;
	info!("starting {} with id {}", descriptor, descriptor.id());

	let mut chord = TCPChord::new(descriptor, TcpAdaptor::with_max_frame_len(config.max_frame_len));
	chord.set_config(config);
	chord.set_join_list(join_list);
	chord.set_join_or_host(args.join_or_host);
	chord.set_receive_handler(|message: String| info!("received: {}", message));
	let handle = chord.start(None).await?;

	let mut status = interval(Duration::from_secs(args.status_every.max(1)));
	loop {
		tokio::select! {
			_ = status.tick() => info!("\n{}", handle.status()),
			_ = tokio::signal::ctrl_c() => break,
		}
	}
	handle.stop().await;
	Ok(())
}
