//! Shared server state: loaded puzzles, joined users, live matches.
//!
//! The lobby is a monitor; one mutex covers users and matches so that
//! checks like "match id unused" and the insert they guard are atomic.
//! Whenever a mutation moves a match in or out of the waiting set, the new
//! listing fans out to every lobby watcher.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use itertools::Itertools;

use crossword_core::Puzzle;
use crossword_core::protocol::quote;

use crate::game::Match;
use crate::session::Outbound;
use crate::watch::Watchers;

struct LobbyState {
    users: HashSet<String>,
    matches: Vec<Arc<Match>>,
}

pub struct Lobby {
    puzzles: Vec<Arc<Puzzle>>,
    state: Mutex<LobbyState>,
    watchers: Watchers,
}

impl Lobby {
    pub fn new(puzzles: Vec<Puzzle>) -> Lobby {
        Lobby {
            puzzles: puzzles.into_iter().map(Arc::new).collect(),
            state: Mutex::new(LobbyState {
                users: HashSet::new(),
                matches: Vec::new(),
            }),
            watchers: Watchers::new(),
        }
    }

    pub fn watchers(&self) -> &Watchers {
        &self.watchers
    }

    /// Registers a user name; false when it is already taken.
    pub fn add_user(&self, name: &str) -> bool {
        let added = self.state.lock().unwrap().users.insert(name.to_string());
        if added {
            log::info!("user {name} joined");
        }
        added
    }

    pub fn find_puzzle(&self, id: &str) -> Option<Arc<Puzzle>> {
        self.puzzles.iter().find(|p| p.id() == id).cloned()
    }

    pub fn find_match(&self, id: &str) -> Option<Arc<Match>> {
        self.state
            .lock()
            .unwrap()
            .matches
            .iter()
            .find(|m| m.id() == id)
            .cloned()
    }

    /// One line per puzzle: `<id> "<name>" "<description>"`.
    pub fn puzzle_lines(&self) -> Vec<String> {
        self.puzzles
            .iter()
            .map(|p| format!("{} {} {}", p.id(), quote(p.name()), quote(p.description())))
            .collect()
    }

    /// One line per match still waiting for a second seat.
    pub fn waiting_lines(&self) -> Vec<String> {
        waiting(&self.state.lock().unwrap().matches)
    }

    /// Creates a match with `user` in the first seat.
    pub fn new_match(
        &self,
        user: &str,
        match_id: &str,
        puzzle_id: &str,
        description: &str,
    ) -> std::result::Result<Arc<Match>, String> {
        let (created, listing) = {
            let mut s = self.state.lock().unwrap();
            if !s.users.contains(user) {
                return Err(format!("user {user} has not joined"));
            }
            if s.matches.iter().any(|m| m.id() == match_id) {
                return Err(format!("match ID {match_id} already in use"));
            }
            let Some(puzzle) = self.find_puzzle(puzzle_id) else {
                return Err(format!("no puzzle {puzzle_id}"));
            };
            let created =
                Arc::new(Match::new(match_id, description, puzzle, user).map_err(|e| e.to_string())?);
            s.matches.push(created.clone());
            (created, waiting(&s.matches))
        };
        log::info!("match {} created on puzzle {}", match_id, puzzle_id);
        self.publish_available(listing);
        Ok(created)
    }

    /// Seats `user` in a waiting match and returns it.
    pub fn play_match(&self, user: &str, match_id: &str) -> std::result::Result<Arc<Match>, String> {
        let (joined, before, after) = {
            let s = self.state.lock().unwrap();
            if !s.users.contains(user) {
                return Err(format!("user {user} has not joined"));
            }
            let Some(found) = s.matches.iter().find(|m| m.id() == match_id).cloned() else {
                return Err(format!("no match {match_id}"));
            };
            let before = waiting(&s.matches);
            found.add_player(user).map_err(|e| e.to_string())?;
            let after = waiting(&s.matches);
            (found, before, after)
        };
        if before != after {
            self.publish_available(after);
        }
        Ok(joined)
    }

    /// Drops a match from the live list. Callers finalize it themselves;
    /// removal happens first so the waiting listing still reflects the
    /// pre-exit state when the change is measured.
    pub fn retire_match(&self, match_id: &str) {
        let (before, after) = {
            let mut s = self.state.lock().unwrap();
            let before = waiting(&s.matches);
            s.matches.retain(|m| m.id() != match_id);
            (before, waiting(&s.matches))
        };
        if before != after {
            self.publish_available(after);
        }
    }

    /// Removes a user entirely (QUIT or connection teardown). A match whose
    /// seats have all departed is finalized and dropped.
    pub fn depart(&self, user: &str) {
        let (doomed, before, after) = {
            let mut s = self.state.lock().unwrap();
            if !s.users.remove(user) {
                return;
            }
            let before = waiting(&s.matches);
            let mut doomed: Vec<Arc<Match>> = Vec::new();
            let LobbyState { users, matches } = &mut *s;
            matches.retain(|m| {
                let abandoned = m.players().iter().all(|p| !users.contains(p));
                if abandoned {
                    doomed.push(m.clone());
                }
                !abandoned
            });
            (doomed, before, waiting(&s.matches))
        };
        log::info!("user {user} left");
        for m in &doomed {
            m.finalize("");
        }
        if before != after {
            self.publish_available(after);
        }
    }

    fn publish_available(&self, listing: Vec<String>) {
        log::debug!("waiting matches: [{}]", listing.iter().join(", "));
        for (_, tx) in self.watchers.snapshot() {
            let _ = tx.send(Outbound::AvailableMatches(listing.clone()));
        }
    }
}

fn waiting(matches: &[Arc<Match>]) -> Vec<String> {
    matches
        .iter()
        .filter(|m| m.is_waiting())
        .map(|m| format!("{} {}", m.id(), quote(m.description())))
        .collect()
}
