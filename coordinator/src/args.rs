use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the group configuration TOML file.
    #[arg(short = 'c', long, default_value = "coordinator.toml")]
    pub config: PathBuf,

    /// IP to bind to.
    #[arg(short, long, default_value = "0.0.0.0")]
    pub ip: String,

    /// Port to bind to.
    #[arg(short, long, default_value_t = 12345)]
    pub port: u16,
}

impl Args {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}
