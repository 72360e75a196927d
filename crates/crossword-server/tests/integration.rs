use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use crossword_core::parser::parse_puzzle;
use crossword_server::Lobby;

const MINIMAL: &str = r#">> "Minimal" "A tiny crossword"

(cat, "Feline pet", DOWN, 0, 1)
(mat, "Floor covering", ACROSS, 1, 0)
(car, "Road vehicle", ACROSS, 0, 1)
(tax, "Annual levy", ACROSS, 2, 1)
"#;

/// Spin up a server on a random port, return its address.
async fn start_server() -> String {
    let lobby = Arc::new(Lobby::new(vec![parse_puzzle("minimal", MINIMAL).unwrap()]));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        crossword_server::serve(lobby, listener).await.unwrap();
    });

    // Give the server a moment to start.
    tokio::time::sleep(Duration::from_millis(50)).await;

    addr.to_string()
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: &str) -> Client {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        Client {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    /// Reads one framed response; None on a closed socket.
    async fn read_frame(&mut self) -> Option<(String, Vec<String>)> {
        let mut header = String::new();
        let n = tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut header))
            .await
            .expect("timed out waiting for a frame")
            .unwrap();
        if n == 0 {
            return None;
        }
        let header = header.trim_end();
        let (kind, count) = header
            .rsplit_once(' ')
            .unwrap_or_else(|| panic!("bad frame header {header:?}"));
        let count: usize = count.parse().unwrap();

        let mut body = Vec::with_capacity(count);
        for _ in 0..count {
            let mut line = String::new();
            tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
                .await
                .expect("timed out reading frame body")
                .unwrap();
            body.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
        Some((kind.to_string(), body))
    }

    /// The next frame must have this exact type.
    async fn expect(&mut self, kind: &str) -> Vec<String> {
        let (got, body) = self.read_frame().await.expect("socket closed");
        assert_eq!(got, kind, "expected {kind}, got {got} {body:?}");
        body
    }

    /// Skips frames until one of this type arrives.
    async fn recv_type(&mut self, kind: &str) -> Vec<String> {
        loop {
            let (got, body) = self.read_frame().await.expect("socket closed");
            if got == kind {
                return body;
            }
        }
    }

    async fn join(&mut self, user: &str) {
        self.send(&format!("ADD_USER {user}")).await;
        assert_eq!(self.expect("ADD_USER").await, vec!["Success"]);
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_user_and_duplicate_rejection() {
    let addr = start_server().await;
    let mut a = Client::connect(&addr).await;
    let mut b = Client::connect(&addr).await;

    a.join("gzlin").await;

    b.send("ADD_USER gzlin").await;
    assert_eq!(
        b.expect("ADD_USER").await,
        vec!["User ID gzlin already in use"]
    );
    b.join("lconboy").await;
}

#[tokio::test]
async fn get_puzzles_lists_the_folder() {
    let addr = start_server().await;
    let mut a = Client::connect(&addr).await;
    a.join("gzlin").await;

    a.send("GET_PUZZLES").await;
    assert_eq!(
        a.expect("GET_PUZZLES").await,
        vec!["minimal \"Minimal\" \"A tiny crossword\""]
    );
}

#[tokio::test]
async fn malformed_input_is_echoed_back() {
    let addr = start_server().await;
    let mut a = Client::connect(&addr).await;

    a.send("FROBNICATE 1 2").await;
    assert_eq!(a.expect("INVALID_REQUEST").await, vec!["FROBNICATE 1 2"]);

    a.send("TRY gzlin").await;
    assert_eq!(a.expect("INVALID_REQUEST").await, vec!["TRY gzlin"]);

    // Commands for a user this session never added are rejected too.
    a.send("NEW_MATCH gzlin m1 minimal \"d\"").await;
    assert_eq!(
        a.expect("INVALID_REQUEST").await,
        vec!["NEW_MATCH gzlin m1 minimal \"d\""]
    );
}

#[tokio::test]
async fn new_match_reaches_others_but_not_the_initiator() {
    let addr = start_server().await;
    let mut a = Client::connect(&addr).await;
    let mut b = Client::connect(&addr).await;
    a.join("gzlin").await;
    b.join("lconboy").await;

    a.send("NEW_MATCH gzlin m1 minimal \"first to three\"").await;
    assert_eq!(a.expect("NEW_MATCH").await, vec!["Success"]);

    // The other session gets exactly one availability push.
    assert_eq!(
        b.expect("AVAILABLE_MATCHES").await,
        vec!["m1 \"first to three\""]
    );

    // The initiator got no echo: the very next frame on its socket is the
    // listing reply it asks for now.
    a.send("GET_MATCHES").await;
    assert_eq!(a.expect("GET_MATCHES").await, vec!["m1 \"first to three\""]);
}

#[tokio::test]
async fn duplicate_match_id_fails() {
    let addr = start_server().await;
    let mut a = Client::connect(&addr).await;
    let mut b = Client::connect(&addr).await;
    a.join("gzlin").await;
    b.join("lconboy").await;

    a.send("NEW_MATCH gzlin m1 minimal \"d\"").await;
    assert_eq!(a.expect("NEW_MATCH").await, vec!["Success"]);

    b.send("NEW_MATCH lconboy m1 minimal \"d\"").await;
    let reply = b.recv_type("NEW_MATCH").await;
    assert_eq!(reply, vec!["Fail match ID m1 already in use"]);

    b.send("NEW_MATCH lconboy m2 nonexistent \"d\"").await;
    assert_eq!(
        b.recv_type("NEW_MATCH").await,
        vec!["Fail no puzzle nonexistent"]
    );
}

#[tokio::test]
async fn play_match_replies_with_the_board_and_notifies_the_creator() {
    let addr = start_server().await;
    let mut a = Client::connect(&addr).await;
    let mut b = Client::connect(&addr).await;
    a.join("gzlin").await;
    b.join("lconboy").await;

    a.send("NEW_MATCH gzlin m1 minimal \"d\"").await;
    assert_eq!(a.expect("NEW_MATCH").await, vec!["Success"]);
    b.recv_type("AVAILABLE_MATCHES").await;

    b.send("PLAY_MATCH lconboy m1").await;
    let board = b.expect("BOARD_CHANGED").await;
    assert_eq!(board[0], "3x4");
    assert!(board.contains(&" gzlin 0".to_string()));
    assert!(board.contains(&" lconboy 0".to_string()));

    // Creator: board push first, then the shrunken listing.
    let push = a.expect("BOARD_CHANGED").await;
    assert_eq!(push[0], "3x4");
    let listing = a.expect("AVAILABLE_MATCHES").await;
    assert!(listing.is_empty());

    // The joiner's own availability echo was suppressed: its next frame is
    // the listing reply below.
    b.send("GET_MATCHES").await;
    assert!(b.expect("GET_MATCHES").await.is_empty());
}

#[tokio::test]
async fn try_reply_always_precedes_its_board_push() {
    let addr = start_server().await;
    let mut a = Client::connect(&addr).await;
    let mut b = Client::connect(&addr).await;
    a.join("gzlin").await;
    b.join("lconboy").await;

    a.send("NEW_MATCH gzlin m1 minimal \"d\"").await;
    a.expect("NEW_MATCH").await;
    b.recv_type("AVAILABLE_MATCHES").await;
    b.send("PLAY_MATCH lconboy m1").await;
    b.expect("BOARD_CHANGED").await;
    a.expect("BOARD_CHANGED").await;
    a.expect("AVAILABLE_MATCHES").await;

    a.send("TRY gzlin m1 1 CAT").await;
    assert_eq!(a.expect("TRY").await, vec!["Valid guess"]);
    let board = a.expect("BOARD_CHANGED").await;
    assert!(board.contains(&"C >1 DOWN 3 ACROSS".to_string()));

    // The opponent sees only the push, without ownership markers.
    let board = b.expect("BOARD_CHANGED").await;
    assert!(board.contains(&"C 1 DOWN 3 ACROSS".to_string()));

    // A rejected guess replies without any push.
    a.send("TRY gzlin m1 1 CATFISH").await;
    assert_eq!(
        a.expect("TRY").await,
        vec!["Invalid guess, wrong word length"]
    );
    a.send("GET_MATCHES").await;
    a.expect("GET_MATCHES").await;
}

#[tokio::test]
async fn successful_challenge_ends_the_game_with_final_scores() {
    let addr = start_server().await;
    let mut a = Client::connect(&addr).await;
    let mut b = Client::connect(&addr).await;
    a.join("gzlin").await;
    b.join("lconboy").await;

    a.send("NEW_MATCH gzlin m1 minimal \"d\"").await;
    a.expect("NEW_MATCH").await;
    b.recv_type("AVAILABLE_MATCHES").await;
    b.send("PLAY_MATCH lconboy m1").await;
    b.expect("BOARD_CHANGED").await;

    for command in [
        "TRY gzlin m1 3 CAR",
        "TRY gzlin m1 2 MAT",
        "TRY gzlin m1 1 CAT",
        "TRY gzlin m1 4 TAR",
    ] {
        a.send(command).await;
        assert_eq!(a.recv_type("TRY").await, vec!["Valid guess"]);
    }

    b.send("CHALLENGE lconboy m1 4 TAX").await;
    assert_eq!(
        b.recv_type("CHALLENGE").await,
        vec!["Successful challenge!"]
    );
    let over = b.expect("GAME_OVER").await;
    assert!(over.contains(&" gzlin 3".to_string()));
    assert!(over.contains(&" lconboy 3".to_string()));

    let over = a.recv_type("GAME_OVER").await;
    assert!(over.contains(&" gzlin 3".to_string()));
}

#[tokio::test]
async fn exit_match_pushes_game_over_and_zeroes_the_forfeiter() {
    let addr = start_server().await;
    let mut a = Client::connect(&addr).await;
    let mut b = Client::connect(&addr).await;
    a.join("gzlin").await;
    b.join("lconboy").await;

    a.send("NEW_MATCH gzlin m1 minimal \"d\"").await;
    a.expect("NEW_MATCH").await;
    b.recv_type("AVAILABLE_MATCHES").await;
    b.send("PLAY_MATCH lconboy m1").await;
    b.expect("BOARD_CHANGED").await;
    a.expect("BOARD_CHANGED").await;
    a.expect("AVAILABLE_MATCHES").await;

    a.send("TRY gzlin m1 1 CAT").await;
    a.expect("TRY").await;
    a.expect("BOARD_CHANGED").await;
    b.expect("BOARD_CHANGED").await;

    a.send("EXIT_MATCH gzlin m1").await;
    let over = a.expect("GAME_OVER").await;
    assert!(over.contains(&" gzlin 0".to_string()));
    let over = b.expect("GAME_OVER").await;
    assert!(over.contains(&" gzlin 0".to_string()));

    // The match is gone from the lobby.
    b.send("GET_MATCHES").await;
    assert!(b.expect("GET_MATCHES").await.is_empty());
}

#[tokio::test]
async fn quit_closes_the_socket_and_frees_waiting_matches() {
    let addr = start_server().await;
    let mut a = Client::connect(&addr).await;
    let mut b = Client::connect(&addr).await;
    a.join("gzlin").await;
    b.join("lconboy").await;

    a.send("NEW_MATCH gzlin m1 minimal \"d\"").await;
    a.expect("NEW_MATCH").await;
    b.recv_type("AVAILABLE_MATCHES").await;

    a.send("QUIT gzlin").await;
    assert!(a.read_frame().await.is_none());

    // The abandoned waiting match disappears for everyone else.
    let listing = b.recv_type("AVAILABLE_MATCHES").await;
    assert!(listing.is_empty());

    // The name is free again.
    let mut c = Client::connect(&addr).await;
    c.join("gzlin").await;
}
