//! Per-connection plumbing.
//!
//! Each client gets a reader task (this module's `run`) and a spawned
//! writer task. They share one unbounded queue: the reader and every
//! fan-out callback enqueue [`Outbound`] messages, the writer drains them
//! into framed responses. The markers `Hold`, `Dispose` and `Quit` are
//! never transmitted; they steer [`WriterState`], which keeps a command's
//! reply ahead of the push it caused and swallows the availability echo of
//! the session's own lobby changes.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crossword_core::{Frame, FrameKind, Request};

use crate::game::Match;
use crate::lobby::Lobby;
use crate::watch::WatcherId;

/// One entry in a session's outbound queue.
#[derive(Clone, Debug)]
pub enum Outbound {
    /// Direct reply to a command this session sent.
    Reply(Frame),
    /// Board view push for a match this session watches.
    BoardChanged(Vec<String>),
    /// Terminal board view push.
    GameOver(Vec<String>),
    /// Waiting-match listing push.
    AvailableMatches(Vec<String>),
    /// Marker: buffer board pushes until the next reply has gone out.
    Hold,
    /// Marker: swallow the next availability push.
    Dispose,
    /// Marker: stop writing and close the socket.
    Quit,
}

/// What the writer should do after one dequeued message.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    Emit(Vec<Frame>),
    Close,
}

/// Pure ordering state machine over the dequeued message sequence.
#[derive(Default)]
pub struct WriterState {
    holding: bool,
    held: Vec<Frame>,
    suppress_available: bool,
}

impl WriterState {
    pub fn apply(&mut self, message: Outbound) -> Step {
        match message {
            Outbound::Reply(frame) => {
                if matches!(frame.kind(), FrameKind::GetMatches | FrameKind::GetPuzzles) {
                    self.suppress_available = false;
                }
                let mut frames = vec![frame];
                if self.holding {
                    frames.append(&mut self.held);
                    self.holding = false;
                }
                Step::Emit(frames)
            }
            Outbound::BoardChanged(view) => self.push(Frame::new(FrameKind::BoardChanged, view)),
            Outbound::GameOver(view) => self.push(Frame::new(FrameKind::GameOver, view)),
            Outbound::AvailableMatches(listing) => {
                if self.suppress_available {
                    self.suppress_available = false;
                    Step::Emit(vec![])
                } else {
                    Step::Emit(vec![Frame::new(FrameKind::AvailableMatches, listing)])
                }
            }
            Outbound::Hold => {
                self.holding = true;
                Step::Emit(vec![])
            }
            Outbound::Dispose => {
                self.suppress_available = true;
                Step::Emit(vec![])
            }
            Outbound::Quit => Step::Close,
        }
    }

    fn push(&mut self, frame: Frame) -> Step {
        if self.holding {
            self.held.push(frame);
            Step::Emit(vec![])
        } else {
            Step::Emit(vec![frame])
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

struct Session {
    lobby: Arc<Lobby>,
    tx: UnboundedSender<Outbound>,
    peer: SocketAddr,
    user: Option<String>,
    lobby_watch: Option<WatcherId>,
    match_watch: Option<(Arc<Match>, WatcherId)>,
}

/// Serves one client connection until QUIT, EOF or an I/O error.
pub async fn run(lobby: Arc<Lobby>, socket: TcpStream, peer: SocketAddr) {
    log::info!("{peer} connected");
    let (read_half, write_half) = socket.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(rx, write_half));

    let mut session = Session {
        lobby,
        tx,
        peer,
        user: None,
        lobby_watch: None,
        match_watch: None,
    };

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if matches!(session.handle_line(&line), Flow::Quit) {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("{peer}: read failed: {e}");
                break;
            }
        }
    }

    session.teardown();
    drop(session);
    let _ = writer.await;
    log::info!("{peer} disconnected");
}

async fn write_loop(mut rx: UnboundedReceiver<Outbound>, mut socket: OwnedWriteHalf) {
    let mut state = WriterState::default();
    while let Some(message) = rx.recv().await {
        match state.apply(message) {
            Step::Emit(frames) => {
                for frame in frames {
                    if let Err(e) = socket.write_all(frame.encode().as_bytes()).await {
                        log::warn!("write failed: {e}");
                        return;
                    }
                }
            }
            Step::Close => return,
        }
    }
}

impl Session {
    fn handle_line(&mut self, line: &str) -> Flow {
        let request = match Request::parse(line) {
            Ok(request) => request,
            Err(e) => {
                log::debug!("{}: rejected {line:?}: {e}", self.peer);
                self.invalid(line);
                return Flow::Continue;
            }
        };
        log::debug!("{}: {request:?}", self.peer);

        match request {
            Request::AddUser { user } => self.add_user(line, user),
            Request::GetPuzzles => {
                self.reply(Frame::new(FrameKind::GetPuzzles, self.lobby.puzzle_lines()));
            }
            Request::GetMatches => {
                self.reply(Frame::new(FrameKind::GetMatches, self.lobby.waiting_lines()));
            }
            Request::NewMatch {
                user,
                match_id,
                puzzle_id,
                description,
            } => self.new_match(line, user, match_id, puzzle_id, description),
            Request::PlayMatch { user, match_id } => self.play_match(line, user, match_id),
            Request::Try {
                user,
                match_id,
                word,
                guess,
            } => self.try_guess(line, user, match_id, word, guess),
            Request::Challenge {
                user,
                match_id,
                word,
                guess,
            } => self.challenge(line, user, match_id, word, guess),
            Request::ExitMatch { user, match_id } => self.exit_match(line, user, match_id),
            Request::Quit { user } => {
                if !self.is_bound(&user) {
                    self.invalid(line);
                    return Flow::Continue;
                }
                self.send(Outbound::Quit);
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    fn add_user(&mut self, line: &str, user: String) {
        if self.user.is_some() {
            self.invalid(line);
            return;
        }
        if self.lobby.add_user(&user) {
            self.lobby_watch = Some(self.lobby.watchers().subscribe(&user, self.tx.clone()));
            self.user = Some(user);
            self.reply(Frame::line(FrameKind::AddUser, "Success"));
        } else {
            self.reply(Frame::line(
                FrameKind::AddUser,
                format!("User ID {user} already in use"),
            ));
        }
    }

    fn new_match(
        &mut self,
        line: &str,
        user: String,
        match_id: String,
        puzzle_id: String,
        description: String,
    ) {
        if !self.is_bound(&user) {
            self.invalid(line);
            return;
        }
        self.send(Outbound::Dispose);
        match self
            .lobby
            .new_match(&user, &match_id, &puzzle_id, &description)
        {
            Ok(created) => {
                self.detach_match();
                let id = created.watchers().subscribe(&user, self.tx.clone());
                self.match_watch = Some((created, id));
                self.reply(Frame::line(FrameKind::NewMatch, "Success"));
            }
            Err(reason) => {
                self.reply(Frame::line(FrameKind::NewMatch, format!("Fail {reason}")));
            }
        }
    }

    fn play_match(&mut self, line: &str, user: String, match_id: String) {
        if !self.is_bound(&user) {
            self.invalid(line);
            return;
        }
        self.send(Outbound::Dispose);
        match self.lobby.play_match(&user, &match_id) {
            Ok(joined) => {
                self.detach_match();
                let id = joined.watchers().subscribe(&user, self.tx.clone());
                let view = joined.view_for(&user);
                self.match_watch = Some((joined, id));
                self.reply(Frame::new(FrameKind::BoardChanged, view));
            }
            Err(reason) => {
                self.reply(Frame::line(FrameKind::PlayMatch, format!("Fail {reason}")));
            }
        }
    }

    fn try_guess(&mut self, line: &str, user: String, match_id: String, word: usize, guess: String) {
        if !self.is_bound(&user) {
            self.invalid(line);
            return;
        }
        let Some(found) = self.lobby.find_match(&match_id) else {
            self.invalid(line);
            return;
        };
        self.send(Outbound::Hold);
        match found.try_guess(&user, word, &guess) {
            Ok(outcome) => self.reply(Frame::line(FrameKind::Try, outcome.to_string())),
            Err(_) => self.invalid(line),
        }
    }

    fn challenge(&mut self, line: &str, user: String, match_id: String, word: usize, guess: String) {
        if !self.is_bound(&user) {
            self.invalid(line);
            return;
        }
        let Some(found) = self.lobby.find_match(&match_id) else {
            self.invalid(line);
            return;
        };
        self.send(Outbound::Hold);
        match found.challenge(&user, word, &guess) {
            Ok(outcome) => self.reply(Frame::line(FrameKind::Challenge, outcome.to_string())),
            Err(_) => self.invalid(line),
        }
    }

    fn exit_match(&mut self, line: &str, user: String, match_id: String) {
        if !self.is_bound(&user) {
            self.invalid(line);
            return;
        }
        let Some((left, id)) = self
            .match_watch
            .take_if(|(m, _)| m.id() == match_id)
        else {
            self.invalid(line);
            return;
        };
        self.send(Outbound::Dispose);
        // Remove from the lobby before finalizing so the availability
        // change is measured against the pre-exit listing.
        self.lobby.retire_match(&match_id);
        left.finalize(&user);
        left.watchers().unsubscribe(id);
    }

    fn is_bound(&self, user: &str) -> bool {
        self.user.as_deref() == Some(user)
    }

    fn detach_match(&mut self) {
        if let Some((m, id)) = self.match_watch.take() {
            m.watchers().unsubscribe(id);
        }
    }

    fn teardown(&mut self) {
        self.detach_match();
        if let Some(id) = self.lobby_watch.take() {
            self.lobby.watchers().unsubscribe(id);
        }
        if let Some(user) = self.user.take() {
            self.lobby.depart(&user);
        }
    }

    fn reply(&self, frame: Frame) {
        self.send(Outbound::Reply(frame));
    }

    fn invalid(&self, line: &str) {
        self.reply(Frame::line(FrameKind::InvalidRequest, line));
    }

    fn send(&self, message: Outbound) {
        let _ = self.tx.send(message);
    }
}
