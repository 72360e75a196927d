pub mod cell;
pub mod error;
pub mod parser;
pub mod protocol;
pub mod puzzle;

pub use cell::{BLANK, Cell};
pub use error::{Error, Result};
pub use protocol::{Frame, FrameKind, Request};
pub use puzzle::{Direction, Entry, Puzzle, WordId};
