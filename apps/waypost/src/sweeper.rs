use tokio::task::JoinHandle;

use crate::broker::SharedRelay;

/// Spawn the periodic eviction task: silent clients, expired sessions,
/// expired access codes. Runs for the life of the process; each tick is
/// idempotent, so a tick racing a disconnect does no extra work.
pub fn spawn(relay: SharedRelay) -> JoinHandle<()> {
    let mut interval = tokio::time::interval(relay.config().sweep_interval());
    tokio::spawn(async move {
        loop {
            interval.tick().await;
            relay.sweep_once().await;
        }
    })
}
