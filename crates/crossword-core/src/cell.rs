use crate::puzzle::{Direction, WordId};

/// Letter value of a cell nobody has guessed yet.
pub const BLANK: char = ' ';

/// One grid square. Cells are immutable values; every rule change reads a
/// cell, computes a replacement and writes it back, so equality doubles as
/// change detection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cell {
    /// Not covered by any entry.
    Gap,
    Letter {
        letter: char,
        confirmed: bool,
        owner_across: Option<String>,
        owner_down: Option<String>,
        /// Word-start tags recorded when the board is built; at most one
        /// per direction.
        starts: Vec<(WordId, Direction)>,
    },
}

impl Cell {
    /// A blank in-puzzle square carrying its start tags.
    pub fn blank(starts: Vec<(WordId, Direction)>) -> Cell {
        Cell::Letter {
            letter: BLANK,
            confirmed: false,
            owner_across: None,
            owner_down: None,
            starts,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, Cell::Gap)
    }

    /// Non-gap and non-blank.
    pub fn has_guess(&self) -> bool {
        matches!(self, Cell::Letter { letter, .. } if *letter != BLANK)
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Cell::Letter { confirmed: true, .. })
    }

    pub fn letter(&self) -> Option<char> {
        match self {
            Cell::Gap => None,
            Cell::Letter { letter, .. } => Some(*letter),
        }
    }

    pub fn owner(&self, dir: Direction) -> Option<&str> {
        match self {
            Cell::Gap => None,
            Cell::Letter {
                owner_across,
                owner_down,
                ..
            } => match dir {
                Direction::Across => owner_across.as_deref(),
                Direction::Down => owner_down.as_deref(),
            },
        }
    }

    /// Whether `player` may write `proposed` here: the letter already
    /// matches, or the cell is blank, or every set owner is the player.
    pub fn consistent_with(&self, proposed: char, player: &str) -> bool {
        match self {
            Cell::Gap => true,
            Cell::Letter {
                letter,
                owner_across,
                owner_down,
                ..
            } => {
                *letter == proposed
                    || *letter == BLANK
                    || [owner_across, owner_down]
                        .iter()
                        .all(|o| o.as_deref().is_none_or(|name| name == player))
            }
        }
    }

    /// Writes a letter and claims ownership in `dir`.
    pub fn with_guess(&self, letter: char, player: &str, dir: Direction) -> Cell {
        match self {
            Cell::Gap => unreachable!("guess written to a gap square"),
            Cell::Letter {
                letter: existing,
                confirmed,
                owner_across,
                owner_down,
                starts,
            } => {
                debug_assert!(!*confirmed || *existing == letter);
                let (owner_across, owner_down) = match dir {
                    Direction::Across => (Some(player.to_string()), owner_down.clone()),
                    Direction::Down => (owner_across.clone(), Some(player.to_string())),
                };
                Cell::Letter {
                    letter,
                    confirmed: *confirmed,
                    owner_across,
                    owner_down,
                    starts: starts.clone(),
                }
            }
        }
    }

    /// Freezes the current letter.
    pub fn confirm(&self) -> Cell {
        match self {
            Cell::Gap => unreachable!("gap square confirmed"),
            Cell::Letter {
                letter,
                owner_across,
                owner_down,
                starts,
                ..
            } => {
                debug_assert!(*letter != BLANK);
                debug_assert!(owner_across.is_some() || owner_down.is_some());
                Cell::Letter {
                    letter: *letter,
                    confirmed: true,
                    owner_across: owner_across.clone(),
                    owner_down: owner_down.clone(),
                    starts: starts.clone(),
                }
            }
        }
    }

    /// Drops the owner in `dir`; the letter reverts to blank once neither
    /// direction holds an owner. The confirmed flag is left alone.
    pub fn clear_direction(&self, dir: Direction) -> Cell {
        match self {
            Cell::Gap => unreachable!("gap square cleared"),
            Cell::Letter {
                letter,
                confirmed,
                owner_across,
                owner_down,
                starts,
            } => {
                let (owner_across, owner_down) = match dir {
                    Direction::Across => (None, owner_down.clone()),
                    Direction::Down => (owner_across.clone(), None),
                };
                let letter = if owner_across.is_none() && owner_down.is_none() {
                    BLANK
                } else {
                    *letter
                };
                Cell::Letter {
                    letter,
                    confirmed: *confirmed,
                    owner_across,
                    owner_down,
                    starts: starts.clone(),
                }
            }
        }
    }

    /// Serializes the square for `viewer`: `EMPTY`, or an optional `+` for
    /// confirmed, the letter (`_` when blank) and the start tags, `>`-marked
    /// where the viewer owns that direction here.
    pub fn render(&self, viewer: &str) -> String {
        match self {
            Cell::Gap => "EMPTY".to_string(),
            Cell::Letter {
                letter,
                confirmed,
                starts,
                ..
            } => {
                let mut out = String::new();
                if *confirmed {
                    out.push('+');
                }
                out.push(if *letter == BLANK { '_' } else { *letter });
                for &(id, dir) in starts {
                    out.push(' ');
                    if self.owner(dir) == Some(viewer) {
                        out.push('>');
                    }
                    out.push_str(&id.to_string());
                    out.push(' ');
                    out.push_str(dir.token());
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Direction::{Across, Down};

    fn blank_with_starts() -> Cell {
        Cell::blank(vec![(1, Down), (3, Across)])
    }

    #[test]
    fn gap_renders_empty() {
        assert_eq!(Cell::Gap.render("anyone"), "EMPTY");
        assert!(!Cell::Gap.has_guess());
        assert!(Cell::Gap.owner(Across).is_none());
    }

    #[test]
    fn blank_renders_underscore_with_tags() {
        let cell = blank_with_starts();
        assert_eq!(cell.render("gzlin"), "_ 1 DOWN 3 ACROSS");
        assert!(!cell.has_guess());
    }

    #[test]
    fn guess_sets_letter_and_owner() {
        let cell = blank_with_starts().with_guess('C', "gzlin", Down);
        assert_eq!(cell.letter(), Some('C'));
        assert_eq!(cell.owner(Down), Some("gzlin"));
        assert!(cell.owner(Across).is_none());
        assert_eq!(cell.render("gzlin"), "C >1 DOWN 3 ACROSS");
        assert_eq!(cell.render("lconboy"), "C 1 DOWN 3 ACROSS");
    }

    #[test]
    fn confirm_marks_plus() {
        let cell = blank_with_starts().with_guess('C', "gzlin", Down).confirm();
        assert!(cell.is_confirmed());
        assert_eq!(cell.render("lconboy"), "+C 1 DOWN 3 ACROSS");
    }

    #[test]
    fn clear_blanks_when_last_owner_leaves() {
        let cell = blank_with_starts().with_guess('C', "gzlin", Down);
        let cleared = cell.clear_direction(Down);
        assert_eq!(cleared.letter(), Some(BLANK));
        assert!(cleared.owner(Down).is_none());
    }

    #[test]
    fn clear_keeps_letter_while_other_owner_remains() {
        let cell = Cell::blank(vec![])
            .with_guess('A', "gzlin", Down)
            .with_guess('A', "gzlin", Across);
        let cleared = cell.clear_direction(Down);
        assert_eq!(cleared.letter(), Some('A'));
        assert_eq!(cleared.owner(Across), Some("gzlin"));
        assert!(cleared.owner(Down).is_none());
        // Dropping the second owner blanks the letter.
        assert_eq!(cleared.clear_direction(Across).letter(), Some(BLANK));
    }

    #[test]
    fn consistency_rules() {
        let blank = Cell::blank(vec![]);
        assert!(blank.consistent_with('X', "gzlin"));

        let owned = blank.with_guess('A', "gzlin", Down);
        // Same letter is always fine, even for the other player.
        assert!(owned.consistent_with('A', "lconboy"));
        // Overwrite is fine for the sole owner, not for the opponent.
        assert!(owned.consistent_with('B', "gzlin"));
        assert!(!owned.consistent_with('B', "lconboy"));
    }
}
