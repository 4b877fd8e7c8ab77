use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the group configuration TOML file, shared with the
    /// coordinator so roster/password stay in sync.
    #[arg(short = 'c', long, default_value = "coordinator.toml")]
    pub config: PathBuf,

    /// Name of the group to join.
    #[arg(short, long)]
    pub group: String,

    /// This participant's name within the group.
    #[arg(short, long)]
    pub participant: String,

    /// Coordinator websocket URL.
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:12345/ws")]
    pub url: String,
}
