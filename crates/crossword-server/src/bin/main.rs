use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use crossword_server::Lobby;

/// Two-player competitive crossword server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Folder of .puzzle files to serve
    puzzle_folder: PathBuf,

    /// TCP port to listen on
    #[arg(long, default_value_t = 4949)]
    port: u16,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _logger = flexi_logger::Logger::try_with_str(&args.log_level)?.start()?;

    let puzzles = crossword_server::load_puzzles(&args.puzzle_folder)?;
    log::info!("serving {} puzzles from {}", puzzles.len(), args.puzzle_folder.display());

    let lobby = Arc::new(Lobby::new(puzzles));
    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    log::info!("listening on port {}", args.port);
    crossword_server::serve(lobby, listener).await?;
    Ok(())
}
