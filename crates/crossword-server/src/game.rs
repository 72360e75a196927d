//! Live match state and the guess/challenge rules.
//!
//! A `Match` is a monitor: one mutex guards seats, scores and the cell map.
//! Cells are immutable values, so every rule change reads a cell, computes a
//! replacement and writes it back; inequality between the two is what drives
//! the board-changed fan-out.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crossword_core::cell::BLANK;
use crossword_core::protocol::quote;
use crossword_core::{Cell, Error, Puzzle, Result, WordId};

use crate::session::Outbound;
use crate::watch::Watchers;

/// Reply to a TRY command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuessOutcome {
    Valid,
    WrongLength,
    SameAsExisting,
    Inconsistent,
}

impl fmt::Display for GuessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GuessOutcome::Valid => "Valid guess",
            GuessOutcome::WrongLength => "Invalid guess, wrong word length",
            GuessOutcome::SameAsExisting => "Invalid guess, same as existing guess",
            GuessOutcome::Inconsistent => "Invalid guess, inconsistent with current board",
        })
    }
}

/// Reply to a CHALLENGE command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChallengeOutcome {
    Successful,
    AlreadyCorrect,
    BothIncorrect,
    WrongLength,
    MissingGuesses,
    OwnWord,
    AllConfirmed,
    SameAsExisting,
}

impl fmt::Display for ChallengeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChallengeOutcome::Successful => "Successful challenge!",
            ChallengeOutcome::AlreadyCorrect => {
                "Failed challenge, target word was already correct"
            }
            ChallengeOutcome::BothIncorrect => {
                "Failed challenge, target word and your guess both incorrect"
            }
            ChallengeOutcome::WrongLength => "Invalid challenge, wrong length",
            ChallengeOutcome::MissingGuesses => {
                "Invalid challenge, not all squares have guesses"
            }
            ChallengeOutcome::OwnWord => "Invalid challenge, you control this word",
            ChallengeOutcome::AllConfirmed => {
                "Invalid challenge, all spaces already confirmed"
            }
            ChallengeOutcome::SameAsExisting => "Invalid challenge, same as existing word",
        })
    }
}

#[derive(Debug)]
struct Board {
    players: Vec<String>,
    scores: HashMap<String, i32>,
    cells: HashMap<(usize, usize), Cell>,
    finalized: bool,
}

#[derive(Debug)]
pub struct Match {
    id: String,
    description: String,
    puzzle: Arc<Puzzle>,
    board: Mutex<Board>,
    watchers: Watchers,
}

impl Match {
    /// Creates a match with its first player seated and a blank board
    /// covering the puzzle's bounding grid.
    pub fn new(
        id: &str,
        description: &str,
        puzzle: Arc<Puzzle>,
        creator: &str,
    ) -> Result<Match> {
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(Error::invalid(format!("bad match id {id:?}")));
        }
        if description.is_empty() {
            return Err(Error::invalid("match description must not be empty"));
        }

        let mut cells = HashMap::new();
        for r in 0..puzzle.rows() {
            for c in 0..puzzle.cols() {
                let cell = if puzzle.contains((r, c)) {
                    Cell::blank(puzzle.starts_at((r, c)))
                } else {
                    Cell::Gap
                };
                cells.insert((r, c), cell);
            }
        }

        Ok(Match {
            id: id.to_string(),
            description: description.to_string(),
            puzzle,
            board: Mutex::new(Board {
                players: vec![creator.to_string()],
                scores: HashMap::from([(creator.to_string(), 0)]),
                cells,
                finalized: false,
            }),
            watchers: Watchers::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn puzzle(&self) -> &Arc<Puzzle> {
        &self.puzzle
    }

    pub fn watchers(&self) -> &Watchers {
        &self.watchers
    }

    pub fn players(&self) -> Vec<String> {
        self.board.lock().unwrap().players.clone()
    }

    pub fn score(&self, player: &str) -> Option<i32> {
        self.board.lock().unwrap().scores.get(player).copied()
    }

    /// One seat filled and not finalized: listed to clients looking for a
    /// game.
    pub fn is_waiting(&self) -> bool {
        let b = self.board.lock().unwrap();
        b.players.len() == 1 && !b.finalized
    }

    pub fn is_finalized(&self) -> bool {
        self.board.lock().unwrap().finalized
    }

    /// Seats the second player. Fails once the match is full, over, or the
    /// name is already seated.
    pub fn add_player(&self, name: &str) -> Result<()> {
        {
            let mut b = self.board.lock().unwrap();
            if b.finalized {
                return Err(Error::invalid("match is already over"));
            }
            if b.players.len() == 2 {
                return Err(Error::invalid("match is full"));
            }
            if b.players.iter().any(|p| p == name) {
                return Err(Error::invalid(format!("{name} is already seated")));
            }
            b.players.push(name.to_string());
            b.scores.insert(name.to_string(), 0);
        }
        log::info!("match {}: {} joined", self.id, name);
        self.publish();
        Ok(())
    }

    /// Applies a guess for one word and reports the outcome. Rewriting a
    /// square the player already owns in the other direction is legal but
    /// clears the player's crossing words that no longer fit.
    pub fn try_guess(&self, player: &str, word: WordId, raw: &str) -> Result<GuessOutcome> {
        let changed = {
            let mut b = self.board.lock().unwrap();
            self.check_move(&b, player, raw)?;
            let entry = self
                .puzzle
                .word(word)
                .ok_or_else(|| Error::invalid(format!("no word {word}")))?;
            let letters: Vec<char> = raw.to_uppercase().chars().collect();
            if letters.len() != entry.len() {
                return Ok(GuessOutcome::WrongLength);
            }
            let direction = entry.direction();

            let mut all_same = true;
            let mut to_clear: Vec<WordId> = Vec::new();
            for (i, pos) in entry.positions().enumerate() {
                let cell = &b.cells[&pos];
                let existing = cell.letter().unwrap_or(BLANK);
                if existing == letters[i] {
                    continue;
                }
                all_same = false;
                if existing == BLANK {
                    continue;
                }
                if cell.is_confirmed() || !cell.consistent_with(letters[i], player) {
                    return Ok(GuessOutcome::Inconsistent);
                }
                // Overwriting our own square: whatever else runs through it
                // is stale once the new letter lands.
                for (other, _) in self.puzzle.entries_through(pos) {
                    if other != word {
                        to_clear.push(other);
                    }
                }
            }
            if all_same {
                return Ok(GuessOutcome::SameAsExisting);
            }

            let mut dirty = false;
            for (i, pos) in entry.positions().enumerate() {
                let old = b.cells[&pos].clone();
                let new = old.with_guess(letters[i], player, direction);
                if new != old {
                    dirty = true;
                }
                b.cells.insert(pos, new);
            }
            to_clear.sort_unstable();
            to_clear.dedup();
            for other in to_clear {
                dirty |= self.clear_entry(&mut b, other);
            }
            dirty
        };
        if changed {
            self.publish();
        }
        Ok(GuessOutcome::Valid)
    }

    /// Resolves a challenge against one word and reports the outcome.
    pub fn challenge(
        &self,
        player: &str,
        word: WordId,
        raw: &str,
    ) -> Result<ChallengeOutcome> {
        let (outcome, changed) = {
            let mut b = self.board.lock().unwrap();
            self.check_move(&b, player, raw)?;
            let entry = self
                .puzzle
                .word(word)
                .ok_or_else(|| Error::invalid(format!("no word {word}")))?;
            let proposed: Vec<char> = raw.to_uppercase().chars().collect();
            if proposed.len() != entry.len() {
                return Ok(ChallengeOutcome::WrongLength);
            }
            let direction = entry.direction();

            let mut all_confirmed = true;
            let mut all_same = true;
            for (i, pos) in entry.positions().enumerate() {
                let cell = &b.cells[&pos];
                if !cell.has_guess() {
                    return Ok(ChallengeOutcome::MissingGuesses);
                }
                if cell.owner(direction) == Some(player) {
                    return Ok(ChallengeOutcome::OwnWord);
                }
                all_confirmed &= cell.is_confirmed();
                all_same &= cell.letter() == Some(proposed[i]);
            }
            if all_confirmed {
                return Ok(ChallengeOutcome::AllConfirmed);
            }
            if all_same {
                return Ok(ChallengeOutcome::SameAsExisting);
            }

            let answer: Vec<char> = entry.answer().chars().collect();
            let challenger_correct = proposed == answer;
            let current_correct = entry
                .positions()
                .zip(answer.iter())
                .all(|(pos, &a)| b.cells[&pos].letter() == Some(a));

            let mut dirty = false;
            let outcome = if challenger_correct {
                *b.scores.get_mut(player).expect("seated player has a score") += 2;
                let mut to_clear: Vec<WordId> = Vec::new();
                for (i, pos) in entry.positions().enumerate() {
                    let old = b.cells[&pos].clone();
                    if old.letter() != Some(answer[i]) {
                        for (other, _) in self.puzzle.entries_through(pos) {
                            if other != word {
                                to_clear.push(other);
                            }
                        }
                    }
                    let new = old.with_guess(answer[i], player, direction).confirm();
                    if new != old {
                        dirty = true;
                    }
                    b.cells.insert(pos, new);
                }
                to_clear.sort_unstable();
                to_clear.dedup();
                for other in to_clear {
                    dirty |= self.clear_entry(&mut b, other);
                }
                ChallengeOutcome::Successful
            } else if current_correct {
                *b.scores.get_mut(player).expect("seated player has a score") -= 1;
                for pos in entry.positions() {
                    let old = b.cells[&pos].clone();
                    let new = old.confirm();
                    if new != old {
                        dirty = true;
                    }
                    b.cells.insert(pos, new);
                }
                ChallengeOutcome::AlreadyCorrect
            } else {
                *b.scores.get_mut(player).expect("seated player has a score") -= 1;
                dirty |= self.clear_entry(&mut b, word);
                ChallengeOutcome::BothIncorrect
            };
            (outcome, dirty)
        };
        if changed {
            self.publish();
        }
        Ok(outcome)
    }

    /// True once every entry reads its answer; computing that finalizes the
    /// match, so this is an observer with a side effect by contract.
    pub fn is_finished(&self) -> bool {
        let mut b = self.board.lock().unwrap();
        if b.finalized {
            return true;
        }
        let complete = self
            .puzzle
            .entries()
            .iter()
            .all(|e| entry_correct(&b, e));
        if complete {
            self.finalize_locked(&mut b, "");
        }
        complete
    }

    /// Ends the match. Correct entries pay their owner one point; with no
    /// forfeiter they are also confirmed. A seated forfeiter drops to zero.
    /// Idempotent.
    pub fn finalize(&self, forfeiter: &str) {
        {
            let mut b = self.board.lock().unwrap();
            if b.finalized {
                return;
            }
            self.finalize_locked(&mut b, forfeiter);
        }
        log::info!("match {} finalized", self.id);
        if !forfeiter.is_empty() {
            self.publish();
        }
    }

    /// Renders the board for one viewer.
    pub fn view_for(&self, viewer: &str) -> Vec<String> {
        let b = self.board.lock().unwrap();
        self.render_view(&b, viewer)
    }

    fn check_move(&self, b: &Board, player: &str, raw: &str) -> Result<()> {
        if b.finalized {
            return Err(Error::invalid("match is over"));
        }
        if !b.players.iter().any(|p| p == player) {
            return Err(Error::invalid(format!("{player} is not seated")));
        }
        if b.players.len() != 2 {
            return Err(Error::invalid("match has an open seat"));
        }
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return Err(Error::invalid("guess must be one whitespace-free word"));
        }
        Ok(())
    }

    /// Runs `clear_direction` along one entry; reports whether any cell
    /// changed.
    fn clear_entry(&self, b: &mut Board, word: WordId) -> bool {
        let entry = self.puzzle.word(word).expect("cleared word exists");
        let mut dirty = false;
        for pos in entry.positions() {
            let old = b.cells[&pos].clone();
            let new = old.clear_direction(entry.direction());
            if new != old {
                dirty = true;
            }
            b.cells.insert(pos, new);
        }
        dirty
    }

    fn finalize_locked(&self, b: &mut Board, forfeiter: &str) {
        b.finalized = true;
        let mut correct: Vec<WordId> = Vec::new();
        for (i, entry) in self.puzzle.entries().iter().enumerate() {
            if !entry_correct(b, entry) {
                continue;
            }
            correct.push(i + 1);
            let owner = b.cells[&entry.start()]
                .owner(entry.direction())
                .map(str::to_string);
            if let Some(owner) = owner
                && let Some(score) = b.scores.get_mut(&owner)
            {
                *score += 1;
            }
        }
        if forfeiter.is_empty() {
            for word in correct {
                let entry = self.puzzle.word(word).expect("correct word exists");
                for pos in entry.positions() {
                    let cell = b.cells[&pos].confirm();
                    b.cells.insert(pos, cell);
                }
            }
        } else if let Some(score) = b.scores.get_mut(forfeiter) {
            *score = 0;
        }
    }

    /// Fans the current board out to every watcher. Views are rendered
    /// after the finished check so completion scoring lands first, and
    /// watchers of a finished match get the terminal push kind.
    fn publish(&self) {
        let over = self.is_finished();
        let subscribers = self.watchers.snapshot();
        if subscribers.is_empty() {
            return;
        }
        let views: Vec<_> = {
            let b = self.board.lock().unwrap();
            subscribers
                .into_iter()
                .map(|(user, tx)| (tx, self.render_view(&b, &user)))
                .collect()
        };
        for (tx, view) in views {
            let message = if over {
                Outbound::GameOver(view)
            } else {
                Outbound::BoardChanged(view)
            };
            let _ = tx.send(message);
        }
    }

    fn render_view(&self, b: &Board, viewer: &str) -> Vec<String> {
        let mut lines =
            Vec::with_capacity(3 + b.cells.len() + b.players.len() + self.puzzle.word_count());
        lines.push(format!("{}x{}", self.puzzle.rows(), self.puzzle.cols()));
        lines.push("Squares:".to_string());
        for r in 0..self.puzzle.rows() {
            for c in 0..self.puzzle.cols() {
                lines.push(b.cells[&(r, c)].render(viewer));
            }
        }
        lines.push("Scores:".to_string());
        for player in &b.players {
            lines.push(format!(" {} {}", player, b.scores[player]));
        }
        lines.push("Questions:".to_string());
        for (i, entry) in self.puzzle.entries().iter().enumerate() {
            lines.push(format!("{} {}", i + 1, quote(entry.clue())));
        }
        lines
    }
}

fn entry_correct(b: &Board, entry: &crossword_core::Entry) -> bool {
    entry
        .positions()
        .zip(entry.answer().chars())
        .all(|(pos, a)| b.cells[&pos].letter() == Some(a))
}
