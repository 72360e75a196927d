//! Wire codec: client request decoding and framed response encoding.
//!
//! Every response is a header line `<TYPE> <N>` followed by N content
//! lines. Requests are single lines with space-separated arguments; the
//! request type is case-insensitive.

use std::fmt;

use crate::error::{Error, Result};
use crate::puzzle::WordId;

/// One client command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    AddUser {
        user: String,
    },
    GetPuzzles,
    GetMatches,
    NewMatch {
        user: String,
        match_id: String,
        puzzle_id: String,
        description: String,
    },
    PlayMatch {
        user: String,
        match_id: String,
    },
    Try {
        user: String,
        match_id: String,
        word: WordId,
        guess: String,
    },
    Challenge {
        user: String,
        match_id: String,
        word: WordId,
        guess: String,
    },
    ExitMatch {
        user: String,
        match_id: String,
    },
    Quit {
        user: String,
    },
}

impl Request {
    pub fn parse(line: &str) -> Result<Request> {
        let mut tokens = line.split_whitespace();
        let kind = tokens
            .next()
            .ok_or_else(|| Error::invalid("empty request"))?
            .to_ascii_uppercase();

        let request = match kind.as_str() {
            "ADD_USER" => Request::AddUser {
                user: take(&mut tokens)?,
            },
            "GET_PUZZLES" => Request::GetPuzzles,
            "GET_MATCHES" => Request::GetMatches,
            "NEW_MATCH" => {
                let user = take(&mut tokens)?;
                let match_id = take(&mut tokens)?;
                let puzzle_id = take(&mut tokens)?;
                // The description is the quoted remainder of the line.
                let quote_at = line
                    .find('"')
                    .ok_or_else(|| Error::invalid("missing description"))?;
                let description = unquote(line[quote_at..].trim_end())?;
                return Ok(Request::NewMatch {
                    user,
                    match_id,
                    puzzle_id,
                    description,
                });
            }
            "PLAY_MATCH" => Request::PlayMatch {
                user: take(&mut tokens)?,
                match_id: take(&mut tokens)?,
            },
            "TRY" => Request::Try {
                user: take(&mut tokens)?,
                match_id: take(&mut tokens)?,
                word: take_word_id(&mut tokens)?,
                guess: take(&mut tokens)?,
            },
            "CHALLENGE" => Request::Challenge {
                user: take(&mut tokens)?,
                match_id: take(&mut tokens)?,
                word: take_word_id(&mut tokens)?,
                guess: take(&mut tokens)?,
            },
            "EXIT_MATCH" => Request::ExitMatch {
                user: take(&mut tokens)?,
                match_id: take(&mut tokens)?,
            },
            "QUIT" => Request::Quit {
                user: take(&mut tokens)?,
            },
            other => {
                return Err(Error::invalid(format!("unknown request type {other}")));
            }
        };

        if tokens.next().is_some() {
            return Err(Error::invalid("trailing arguments"));
        }
        Ok(request)
    }
}

fn take<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<String> {
    tokens
        .next()
        .map(str::to_string)
        .ok_or_else(|| Error::invalid("missing argument"))
}

fn take_word_id<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<WordId> {
    let token = take(tokens)?;
    token
        .parse()
        .map_err(|_| Error::invalid(format!("bad word id {token:?}")))
}

/// Response frame types, client replies and server pushes alike.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    AddUser,
    GetPuzzles,
    GetMatches,
    NewMatch,
    PlayMatch,
    Try,
    Challenge,
    InvalidRequest,
    BoardChanged,
    GameOver,
    AvailableMatches,
}

impl FrameKind {
    pub fn token(self) -> &'static str {
        match self {
            FrameKind::AddUser => "ADD_USER",
            FrameKind::GetPuzzles => "GET_PUZZLES",
            FrameKind::GetMatches => "GET_MATCHES",
            FrameKind::NewMatch => "NEW_MATCH",
            FrameKind::PlayMatch => "PLAY_MATCH",
            FrameKind::Try => "TRY",
            FrameKind::Challenge => "CHALLENGE",
            FrameKind::InvalidRequest => "INVALID_REQUEST",
            FrameKind::BoardChanged => "BOARD_CHANGED",
            FrameKind::GameOver => "GAME_OVER",
            FrameKind::AvailableMatches => "AVAILABLE_MATCHES",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A framed response: type, content line count, content lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    kind: FrameKind,
    body: Vec<String>,
}

impl Frame {
    pub fn new(kind: FrameKind, body: Vec<String>) -> Frame {
        Frame { kind, body }
    }

    /// A single-line frame.
    pub fn line(kind: FrameKind, line: impl Into<String>) -> Frame {
        Frame::new(kind, vec![line.into()])
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn body(&self) -> &[String] {
        &self.body
    }

    pub fn encode(&self) -> String {
        let mut out = format!("{} {}\n", self.kind.token(), self.body.len());
        for line in &self.body {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Wraps a string in double quotes, escaping `\\`, `\n`, `\r` and `\t`.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Inverse of [`quote`]; the whole input must be one quoted string.
pub fn unquote(s: &str) -> Result<String> {
    let mut chars = s.chars();
    if chars.next() != Some('"') {
        return Err(Error::invalid("expected opening quote"));
    }
    let mut out = String::new();
    loop {
        match chars.next() {
            None => return Err(Error::invalid("unterminated string")),
            Some('"') => break,
            Some('\\') => match chars.next() {
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                other => {
                    return Err(Error::invalid(format!("invalid escape {other:?}")));
                }
            },
            Some('\n' | '\r') => return Err(Error::invalid("newline in string")),
            Some(c) => out.push(c),
        }
    }
    if chars.next().is_some() {
        return Err(Error::invalid("trailing characters after string"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_requests() {
        assert_eq!(
            Request::parse("ADD_USER gzlin").unwrap(),
            Request::AddUser {
                user: "gzlin".into()
            }
        );
        assert_eq!(Request::parse("GET_PUZZLES").unwrap(), Request::GetPuzzles);
        assert_eq!(
            Request::parse("quit gzlin").unwrap(),
            Request::Quit {
                user: "gzlin".into()
            }
        );
    }

    #[test]
    fn request_type_is_case_insensitive() {
        assert_eq!(
            Request::parse("try gzlin m1 2 CAT").unwrap(),
            Request::Try {
                user: "gzlin".into(),
                match_id: "m1".into(),
                word: 2,
                guess: "CAT".into(),
            }
        );
    }

    #[test]
    fn parses_new_match_with_quoted_description() {
        assert_eq!(
            Request::parse("NEW_MATCH gzlin m1 minimal \"friendly game\"").unwrap(),
            Request::NewMatch {
                user: "gzlin".into(),
                match_id: "m1".into(),
                puzzle_id: "minimal".into(),
                description: "friendly game".into(),
            }
        );
    }

    #[test]
    fn rejects_malformed_requests() {
        assert!(Request::parse("").is_err());
        assert!(Request::parse("FROBNICATE x").is_err());
        assert!(Request::parse("ADD_USER").is_err());
        assert!(Request::parse("ADD_USER a b").is_err());
        assert!(Request::parse("TRY gzlin m1 two CAT").is_err());
        assert!(Request::parse("NEW_MATCH gzlin m1 minimal nodesc").is_err());
    }

    #[test]
    fn encodes_frames() {
        let frame = Frame::line(FrameKind::Try, "Valid guess");
        assert_eq!(frame.encode(), "TRY 1\nValid guess\n");

        let empty = Frame::new(FrameKind::GetMatches, vec![]);
        assert_eq!(empty.encode(), "GET_MATCHES 0\n");
    }

    #[test]
    fn quote_round_trip() {
        let original = "tab\there \\ and \n newline";
        assert_eq!(unquote(&quote(original)).unwrap(), original);
        assert!(unquote("\"unterminated").is_err());
        assert!(unquote("no quotes").is_err());
        assert!(unquote("\"a\" b").is_err());
    }
}
