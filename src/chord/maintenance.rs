use tokio::{task::JoinHandle, time::{interval_at, Instant, MissedTickBehavior}};
use tracing::{debug, trace};

use super::ChordNode;
use crate::chord_id::ChordId;


/// Start the periodic stabilize, fix_fingers and check_predecessor cycle.
/// Ticks run one at a time; a tick that falls behind delays the next one
/// instead of bursting.
pub(super) fn spawn<I: ChordId>(node: ChordNode<I>) -> JoinHandle<()> {
	tokio::spawn(async move{
		let config = node.config().clone();
		let start = Instant::now();
		let mut stabilize = interval_at(start + config.stabilize_interval(), config.stabilize_interval());
		let mut fix_fingers = interval_at(start + config.fix_fingers_interval(), config.fix_fingers_interval());
		let mut check_predecessor = interval_at(start + config.check_predecessor_interval(), config.check_predecessor_interval());
		for timer in [&mut stabilize, &mut fix_fingers, &mut check_predecessor] {
			timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
		}

		loop{
			tokio::select! {
				_ = stabilize.tick() => {
					trace!("{} stabilize tick", node.name());
					if let Err(e) = node.stabilize().await {
						debug!("{} stabilize failed: {}", node.name(), e);
					}
				},
				_ = fix_fingers.tick() => {
					if let Err(e) = node.fix_fingers().await {
						debug!("{} fix_fingers failed: {}", node.name(), e);
					}
				},
				_ = check_predecessor.tick() => {
					if let Err(e) = node.check_predecessor().await {
						debug!("{} check_predecessor failed: {}", node.name(), e);
					}
				},
			}
		}
	})
}
