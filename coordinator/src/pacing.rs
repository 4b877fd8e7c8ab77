//! Periodic round-opening task. One task per group; each tick it
//! opens a new round only if the full roster is bound *and* handshake-ready,
//! anchoring on the full roster (not just the active set) so the XOR
//! completeness invariant holds trivially.

use std::time::Duration;

use dcnet_common::consts::ROUND_PACING_MILLIS;
use dcnet_common::types::ServerMessage;
use tracing::info;

use crate::state::SharedState;

pub fn spawn_pacing_tasks(state: SharedState) {
    for group_name in state.config.group.keys().cloned().collect::<Vec<_>>() {
        let state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(ROUND_PACING_MILLIS));
            loop {
                interval.tick().await;
                try_open_round(&state, &group_name).await;
            }
        });
    }
}

async fn try_open_round(state: &SharedState, group_name: &str) {
    let Some(group_config) = state.config.group(group_name) else {
        return;
    };
    let Some(group_lock) = state.groups.get(group_name) else {
        return;
    };
    let mut gs = group_lock.write().await;
    if !gs.is_fully_bound(&group_config.roster) || !gs.is_fully_handshake_ready(&group_config.roster)
    {
        return;
    }
    let index = gs.slots.len() as u64;
    gs.slots.push(Default::default());
    info!(group = group_name, index, "opening round");
    gs.broadcast(&ServerMessage::AnonymousBroadcastRequest { index });
}
