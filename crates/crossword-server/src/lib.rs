pub mod game;
pub mod lobby;
pub mod session;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;

use crossword_core::{Puzzle, parser};

pub use game::{ChallengeOutcome, GuessOutcome, Match};
pub use lobby::Lobby;

/// Accepts connections forever, spawning one session per client.
pub async fn serve(lobby: Arc<Lobby>, listener: TcpListener) -> std::io::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        tokio::spawn(session::run(lobby.clone(), socket, peer));
    }
}

/// Loads every `*.puzzle` file in a folder. Unreadable or invalid files are
/// logged and skipped; a missing or non-directory path is fatal.
pub fn load_puzzles(dir: &Path) -> anyhow::Result<Vec<Puzzle>> {
    anyhow::ensure!(dir.is_dir(), "{} is not a directory", dir.display());

    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "puzzle"))
        .collect();
    paths.sort();

    let mut puzzles = Vec::new();
    for path in paths {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let parsed = std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|text| parser::parse_puzzle(stem, &text).map_err(anyhow::Error::from));
        match parsed {
            Ok(puzzle) => {
                log::info!("loaded puzzle {} ({} words)", puzzle.id(), puzzle.word_count());
                puzzles.push(puzzle);
            }
            Err(e) => log::warn!("skipping {}: {e}", path.display()),
        }
    }
    Ok(puzzles)
}
