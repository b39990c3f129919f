use std::{path::Path, time::Duration};

use serde::{Serialize, Deserialize};
use tokio::fs;

use crate::error::{ChordError, Result};

/// Timing and size limits of a node. Missing fields in a config file take
/// their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChordConfig{
	pub stabilize_interval_ms: u64,
	pub fix_fingers_interval_ms: u64,
	pub check_predecessor_interval_ms: u64,
	/// Bound on every outbound RPC. A timed out call counts as an unreachable peer.
	pub rpc_timeout_ms: u64,
	pub max_lookup_hops: usize,
	/// Largest payload `receive` accepts.
	pub max_message_len: usize,
	/// Largest frame a transport reads before giving up on the peer.
	pub max_frame_len: usize,
}

impl Default for ChordConfig{
	fn default() -> Self {
		ChordConfig{
			stabilize_interval_ms: 1000,
			fix_fingers_interval_ms: 500,
			check_predecessor_interval_ms: 2000,
			rpc_timeout_ms: 3000,
			max_lookup_hops: 256,
			max_message_len: 1024,
			max_frame_len: 64 * 1024,
		}
	}
}

impl ChordConfig{
	pub fn stabilize_interval(&self) -> Duration {
		Duration::from_millis(self.stabilize_interval_ms)
	}

	pub fn fix_fingers_interval(&self) -> Duration {
		Duration::from_millis(self.fix_fingers_interval_ms)
	}

	pub fn check_predecessor_interval(&self) -> Duration {
		Duration::from_millis(self.check_predecessor_interval_ms)
	}

	pub fn rpc_timeout(&self) -> Duration {
		Duration::from_millis(self.rpc_timeout_ms)
	}

	pub fn validate(&self) -> Result<()> {
		let checks = [
			(self.stabilize_interval_ms == 0, "stabilize_interval_ms must be positive"),
			(self.fix_fingers_interval_ms == 0, "fix_fingers_interval_ms must be positive"),
			(self.check_predecessor_interval_ms == 0, "check_predecessor_interval_ms must be positive"),
			(self.rpc_timeout_ms == 0, "rpc_timeout_ms must be positive"),
			(self.max_lookup_hops == 0, "max_lookup_hops must be positive"),
			(self.max_message_len == 0, "max_message_len must be positive"),
			(self.max_frame_len <= self.max_message_len, "max_frame_len must exceed max_message_len"),
		];
		match checks.iter().find(|(failed, _)| *failed){
			Some((_, reason)) => Err(ChordError::Config(reason.to_string())),
			None => Ok(()),
		}
	}

	/// Read a config from a JSON file and validate it.
	pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self>{
		let data = fs::read_to_string(&path).await?;
		let config: ChordConfig = serde_json::from_str(&data)?;
		config.validate()?;
		Ok(config)
	}

	pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()>{
		let data = serde_json::to_string_pretty(self)?;
		fs::write(path, data).await?;
		Ok(())
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_valid() {
		let config = ChordConfig::default();
		assert!(config.validate().is_ok());
		assert_eq!(config.max_message_len, 1024);
		assert_eq!(config.rpc_timeout(), Duration::from_secs(3));
	}

	#[test]
	fn partial_json_falls_back_to_defaults() {
		let config: ChordConfig = serde_json::from_str(r#"{"stabilize_interval_ms": 50}"#).expect("parse");
		assert_eq!(config.stabilize_interval(), Duration::from_millis(50));
		assert_eq!(config.max_lookup_hops, ChordConfig::default().max_lookup_hops);
	}

	#[test]
	fn zero_values_are_rejected() {
		let config = ChordConfig{ rpc_timeout_ms: 0, ..ChordConfig::default() };
		assert!(matches!(config.validate(), Err(ChordError::Config(_))));
		let config = ChordConfig{ max_frame_len: 10, ..ChordConfig::default() };
		assert!(config.validate().is_err());
	}

	#[tokio::test]
	async fn file_round_trip() {
		let path = std::env::temp_dir().join(format!("chord-config-{}.json", std::process::id()));
		let config = ChordConfig{ max_lookup_hops: 12, ..ChordConfig::default() };
		config.save(&path).await.expect("save");
		let loaded = ChordConfig::from_file(&path).await.expect("load");
		let _ = std::fs::remove_file(&path);
		assert_eq!(loaded, config);
	}
}
