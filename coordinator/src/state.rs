//! Server-side state. Mutations to a given group are always done
//! while holding that group's `RwLock` write guard across the full
//! "accept contribution -> check completeness -> compute fan-out" sequence,
//! never across an `.await` — fan-out sends happen after the guard is
//! dropped, using cloned channel handles.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dcnet_common::config::Config;
use dcnet_common::types::ServerMessage;
use dcnet_common::WireUint;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;

/// One append-only round slot: a partial or complete map of contributions.
pub type RoundSlot = HashMap<String, WireUint>;

/// Per-connection outbound channel. The websocket write task drains this and
/// forwards to the socket; handlers never touch the socket directly.
pub type Outbox = UnboundedSender<ServerMessage>;

/// Mutable state for a single group.
#[derive(Default)]
pub struct GroupState {
    /// Active identity -> session outbox, at most one entry per identity.
    pub bindings: HashMap<String, Outbox>,
    /// Identities that have sent `secrets_generated` since the roster was
    /// last fully present (reset on any disconnect, per the safe-default
    /// re-keying behavior).
    pub handshake_ready: HashSet<String>,
    /// Whether `generate_secrets` has already been sent for the roster's
    /// current fully-present window, so we don't refire on every join.
    pub handshake_triggered: bool,
    /// Append-only list of round slots, indexed by position.
    pub slots: Vec<RoundSlot>,
}

impl GroupState {
    pub fn is_fully_bound(&self, roster: &[String]) -> bool {
        roster.iter().all(|p| self.bindings.contains_key(p))
    }

    pub fn is_fully_handshake_ready(&self, roster: &[String]) -> bool {
        roster.iter().all(|p| self.handshake_ready.contains(p))
    }

    pub fn active_participants(&self, roster: &[String]) -> Vec<String> {
        roster
            .iter()
            .filter(|p| self.bindings.contains_key(*p))
            .cloned()
            .collect()
    }

    pub fn broadcast(&self, message: &ServerMessage) {
        for tx in self.bindings.values() {
            let _ = tx.send(message.clone());
        }
    }
}

pub struct AppState {
    pub config: Config,
    pub groups: HashMap<String, RwLock<GroupState>>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: Config) -> SharedState {
        let groups = config
            .group
            .keys()
            .map(|name| (name.clone(), RwLock::new(GroupState::default())))
            .collect();
        Arc::new(AppState { config, groups })
    }
}
