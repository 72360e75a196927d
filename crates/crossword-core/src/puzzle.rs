use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// 1-based index of an entry in its puzzle's entry list.
pub type WordId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Across,
    Down,
}

impl Direction {
    pub fn token(self) -> &'static str {
        match self {
            Direction::Across => "ACROSS",
            Direction::Down => "DOWN",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Direction> {
        match s {
            "ACROSS" => Ok(Direction::Across),
            "DOWN" => Ok(Direction::Down),
            other => Err(Error::invalid(format!("unknown direction {other}"))),
        }
    }
}

/// The solution for one word: answer, clue and where it sits on the grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    answer: String,
    clue: String,
    direction: Direction,
    row: usize,
    col: usize,
}

impl Entry {
    /// Builds an entry, uppercasing the answer. The answer must be nonempty
    /// and free of whitespace; the clue must be nonempty and single-line.
    pub fn new(
        answer: &str,
        clue: &str,
        direction: Direction,
        row: usize,
        col: usize,
    ) -> Result<Entry> {
        if answer.is_empty() {
            return Err(Error::invalid("answer must not be empty"));
        }
        if answer.chars().any(char::is_whitespace) {
            return Err(Error::invalid(format!(
                "answer {answer:?} must not contain whitespace"
            )));
        }
        if clue.is_empty() {
            return Err(Error::invalid("clue must not be empty"));
        }
        if clue.contains('\n') || clue.contains('\r') {
            return Err(Error::invalid("clue must not contain newlines"));
        }
        Ok(Entry {
            answer: answer.to_uppercase(),
            clue: clue.to_string(),
            direction,
            row,
            col,
        })
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn clue(&self) -> &str {
        &self.clue
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn start(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn len(&self) -> usize {
        self.answer.chars().count()
    }

    /// Last coordinate on the variable axis.
    pub fn end(&self) -> usize {
        let start = match self.direction {
            Direction::Across => self.col,
            Direction::Down => self.row,
        };
        start + self.len() - 1
    }

    /// Grid positions covered by this entry, in answer order.
    pub fn positions(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let (row, col) = (self.row, self.col);
        let direction = self.direction;
        (0..self.len()).map(move |i| match direction {
            Direction::Across => (row, col + i),
            Direction::Down => (row + i, col),
        })
    }

    pub fn covers(&self, pos: (usize, usize)) -> bool {
        match self.direction {
            Direction::Across => pos.0 == self.row && (self.col..=self.end()).contains(&pos.1),
            Direction::Down => pos.1 == self.col && (self.row..=self.end()).contains(&pos.0),
        }
    }

    /// The answer letter at a covered position.
    pub fn letter_at(&self, pos: (usize, usize)) -> Option<char> {
        if !self.covers(pos) {
            return None;
        }
        let offset = match self.direction {
            Direction::Across => pos.1 - self.col,
            Direction::Down => pos.0 - self.row,
        };
        self.answer.chars().nth(offset)
    }
}

/// An immutable crossword definition: identifier, display name, description
/// and the ordered entry list. Construction enforces consistency.
#[derive(Clone, Debug)]
pub struct Puzzle {
    id: String,
    name: String,
    description: String,
    entries: Vec<Entry>,
    rows: usize,
    cols: usize,
}

impl Puzzle {
    pub fn new(id: &str, name: &str, description: &str, entries: Vec<Entry>) -> Result<Puzzle> {
        if id.is_empty() {
            return Err(Error::invalid("puzzle id must not be empty"));
        }
        if id.contains('/') || id.contains('\\') {
            return Err(Error::invalid(format!(
                "puzzle id {id:?} must not contain a path separator"
            )));
        }
        if id.ends_with(".puzzle") {
            return Err(Error::invalid(format!(
                "puzzle id {id:?} must not carry the .puzzle suffix"
            )));
        }
        if name.is_empty() {
            return Err(Error::invalid("puzzle name must not be empty"));
        }
        check_consistency(&entries)?;

        let mut rows = 0;
        let mut cols = 0;
        for entry in &entries {
            for (r, c) in entry.positions() {
                rows = rows.max(r + 1);
                cols = cols.max(c + 1);
            }
        }

        Ok(Puzzle {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            entries,
            rows,
            cols,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn word_count(&self) -> usize {
        self.entries.len()
    }

    /// Looks up an entry by its 1-based word id.
    pub fn word(&self, id: WordId) -> Option<&Entry> {
        id.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// A position is in-puzzle iff some entry covers it.
    pub fn contains(&self, pos: (usize, usize)) -> bool {
        self.entries.iter().any(|e| e.covers(pos))
    }

    /// Word-start tags at a position, ordered by word id.
    pub fn starts_at(&self, pos: (usize, usize)) -> Vec<(WordId, Direction)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.start() == pos)
            .map(|(i, e)| (i + 1, e.direction()))
            .collect()
    }

    /// Every entry covering a position, with its word id.
    pub fn entries_through(&self, pos: (usize, usize)) -> Vec<(WordId, &Entry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.covers(pos))
            .map(|(i, e)| (i + 1, e))
            .collect()
    }
}

fn check_consistency(entries: &[Entry]) -> Result<()> {
    for (i, a) in entries.iter().enumerate() {
        for b in &entries[i + 1..] {
            if a.answer() == b.answer() {
                return Err(Error::invalid(format!(
                    "duplicate answer {:?}",
                    a.answer()
                )));
            }
            let shared: Vec<(usize, usize)> =
                a.positions().filter(|&p| b.covers(p)).collect();
            if a.direction() == b.direction() {
                if !shared.is_empty() {
                    return Err(Error::invalid(format!(
                        "{:?} and {:?} overlap in the same direction",
                        a.answer(),
                        b.answer()
                    )));
                }
            } else {
                if shared.len() > 1 {
                    return Err(Error::invalid(format!(
                        "{:?} and {:?} cross more than once",
                        a.answer(),
                        b.answer()
                    )));
                }
                if let Some(&pos) = shared.first()
                    && a.letter_at(pos) != b.letter_at(pos)
                {
                    return Err(Error::invalid(format!(
                        "{:?} and {:?} disagree at {:?}",
                        a.answer(),
                        b.answer(),
                        pos
                    )));
                }
            }
        }
    }
    Ok(())
}
