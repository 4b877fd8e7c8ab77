//! Interactive terminal front-end: stdin lines become queued messages,
//! incoming coordinator traffic drives the protocol engine, and engine
//! events get printed as they happen.

use std::collections::HashMap;

use dcnet_common::config::Config;
use dcnet_common::crypto::{load_private_key, load_public_key};
use dcnet_common::{Error, Result};
use rand::rngs::OsRng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::args::Args;
use crate::comms::Connection;
use crate::engine::{EngineEvent, ParticipantEngine};

pub async fn run(args: &Args) -> Result<()> {
    let config = Config::load(&args.config)?;
    let group = config
        .group(&args.group)
        .ok_or_else(|| Error::Config(format!("unknown group {}", args.group)))?;
    if !group.contains(&args.participant) {
        return Err(Error::Config(format!(
            "{} is not a member of group {}",
            args.participant, args.group
        )));
    }

    let private_key = load_private_key(config.private_key_path(&args.participant))?;
    let mut peer_public_keys = HashMap::new();
    for peer in group.roster.iter().filter(|p| **p != args.participant) {
        peer_public_keys.insert(peer.clone(), load_public_key(config.public_key_path(peer))?);
    }

    let mut engine = ParticipantEngine::new(
        args.group.clone(),
        args.participant.clone(),
        group.roster.clone(),
        private_key,
        peer_public_keys,
    );

    let mut conn = Connection::connect(&args.url).await?;
    conn.send(&engine.join_message(group.password.clone())).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!(
        "connected as {} in group {}; type a message and press enter to queue it",
        engine.me(),
        engine.group()
    );

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(text)) => {
                        if !text.is_empty() {
                            engine.queue_message(text);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "stdin read error");
                        break;
                    }
                }
            }
            incoming = conn.recv() => {
                match incoming {
                    Some(Ok(message)) => {
                        let (outgoing, events) = engine.handle(message, &mut OsRng);
                        for reply in outgoing {
                            if let Err(e) = conn.send(&reply).await {
                                warn!(error = %e, "failed to send to coordinator");
                            }
                        }
                        for event in events {
                            print_event(event);
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, "malformed message from coordinator"),
                    None => {
                        info!("coordinator connection closed");
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

fn print_event(event: EngineEvent) {
    match event {
        EngineEvent::Joined { active_participants } => {
            println!("joined; active participants: {}", active_participants.join(", "));
        }
        EngineEvent::ActiveParticipantsChanged(active) => {
            println!("active participants: {}", active.join(", "));
        }
        EngineEvent::HandshakeComplete => {
            println!("handshake complete, rounds will begin shortly");
        }
        EngineEvent::OwnMessageDelivered(text) => println!("[sent] {text}"),
        EngineEvent::PeerMessage(text) => println!("[received] {text}"),
        EngineEvent::CollisionBackoff { rounds } => {
            info!(rounds, "collision detected, backing off");
        }
        EngineEvent::Dropped { reason } => warn!(reason = %reason, "coordinator rejected a message"),
    }
}
