use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod listen;
pub mod send;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send frames to a local receiver.
    Send(SendArgs),
    /// Listen and print received frames.
    Listen(ListenArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args).await,
        Command::Listen(args) => listen::run(args, format).await,
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Raw string payload. Reads stdin when neither --data nor --file is set.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Loopback port to connect to.
    #[arg(long, short = 'p', default_value_t = wormhole_peer::DEFAULT_PORT)]
    pub port: u16,
    /// Send the payload N times.
    #[arg(long, default_value_t = 1)]
    pub repeat: usize,
    /// Maximum time to wait for the link (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Loopback port to bind.
    #[arg(long, short = 'p', default_value_t = wormhole_peer::DEFAULT_PORT)]
    pub port: u16,
    /// Receive buffer capacity in bytes.
    #[arg(long, value_name = "BYTES")]
    pub buffer_capacity: Option<usize>,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
}
