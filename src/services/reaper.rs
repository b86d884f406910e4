//! Staleness reaper — background eviction of silent publishers.
//!
//! DESIGN
//! ======
//! A background task ticks on a fixed interval and sweeps every room.
//! Entries whose `last_seen_at` is older than the expiry window are removed
//! under the room's write lock; the matching `bye` notices go out right
//! after the lock drops, so eviction and notification are one completed
//! unit per tick. Cancelling the task between ticks leaves every room
//! consistent.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::msg::{ServerMessage, now_ms};
use crate::services::hub;
use crate::state::AppState;

/// Seconds between sweeps. Override with `REAPER_INTERVAL_SECS`.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10;

/// Seconds of silence before a publisher entry is evicted.
/// Override with `PUBLISHER_EXPIRE_SECS`.
pub const DEFAULT_EXPIRE_SECS: u64 = 180;

/// Spawn the background reaper task. Returns a handle for shutdown.
pub fn spawn_reaper_task(state: AppState) -> JoinHandle<()> {
    let interval_secs = crate::config::env_parse("REAPER_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS);
    let expire_secs = crate::config::env_parse("PUBLISHER_EXPIRE_SECS", DEFAULT_EXPIRE_SECS);
    info!(interval_secs, expire_secs, "staleness reaper configured");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick of tokio's interval fires immediately; that sweep is a no-op.
        loop {
            ticker.tick().await;
            sweep(&state, i64::try_from(expire_secs * 1000).unwrap_or(i64::MAX), now_ms()).await;
        }
    })
}

/// One sweep over all rooms: evict expired entries and notify subscribers.
pub(crate) async fn sweep(state: &AppState, expire_ms: i64, now: i64) {
    for (room_id, room) in state.rooms.snapshot().await {
        let expired: Vec<String> = {
            let mut inner = room.inner.write().await;
            let keys: Vec<String> = inner
                .publishers
                .iter()
                .filter(|(_, st)| now - st.last_seen_at > expire_ms)
                .map(|(key, _)| key.clone())
                .collect();
            for key in &keys {
                inner.publishers.remove(key);
            }
            keys
        };

        for key in expired {
            info!(room = %room_id, key = %key, "evicted stale publisher");
            hub::broadcast(
                state,
                &room_id,
                &ServerMessage::Bye { room: room_id.clone(), publisher_key: key },
            )
            .await;
        }
    }
}

#[cfg(test)]
#[path = "reaper_test.rs"]
mod tests;
