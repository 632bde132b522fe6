use std::env;
use std::fs::File;
use std::io::prelude::*;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;

use log::{debug, info, warn};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use serde::Deserialize;
use slab::Slab;
use tungstenite::util::NonBlockingError;
use tungstenite::{accept, HandshakeError, Message, WebSocket};

use common::{
    ChatLine, ClientMessage, PieceColour, ServerMessage, SessionView, UserEntry,
};
use engine::{ParticipantId, Session};

#[derive(Deserialize, Debug)]
struct Config {
    host: SocketAddr,
}

impl Config {
    fn from_file<P: AsRef<Path>>(path: P) -> Config {
        let mut file = File::open(&path).expect("could not open config file");
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .expect("reading config file failed");
        toml::from_str(&contents).expect("config file incorrectly formatted")
    }
}

const SERVER: Token = Token(0);
const FIRST_CLIENT: Token = Token(1);

fn client_conn_token(index: usize) -> Token {
    Token(index + FIRST_CLIENT.0)
}

fn client_conn_untoken(token: Token) -> usize {
    token.0 - FIRST_CLIENT.0
}

fn is_client(token: Token) -> bool {
    token.0 >= FIRST_CLIENT.0
}

struct Client {
    websocket: WebSocket<TcpStream>,
    name: Option<String>,
}

impl Client {
    fn new(websocket: WebSocket<TcpStream>) -> Client {
        Client {
            websocket,
            name: None,
        }
    }
}

struct State {
    poll: Poll,
    listener: TcpListener,
    clients: Slab<Client>,
    session: Session,
    chat_log: Vec<ChatLine>,
}

fn encode(message: &ServerMessage) -> String {
    serde_json::to_string(message).unwrap()
}

impl State {
    fn accept_clients(&mut self) {
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("client accept failed: {}", e);
                    break;
                }
            };
            if let Err(e) = self.new_client(stream, peer) {
                warn!("websocket handshake with {} failed: {}", peer, e);
            }
        }
    }

    fn new_client(&mut self, stream: TcpStream, peer: SocketAddr) -> tungstenite::Result<()> {
        let mut handshake = accept(stream);
        let websocket = loop {
            match handshake {
                Ok(websocket) => break websocket,
                Err(HandshakeError::Interrupted(in_progress)) => handshake = in_progress.handshake(),
                Err(HandshakeError::Failure(e)) => return Err(e),
            }
        };

        let index = self.clients.insert(Client::new(websocket));
        let client = &mut self.clients[index];
        self.poll.registry().register(
            client.websocket.get_mut(),
            client_conn_token(index),
            Interest::READABLE,
        )?;
        info!("connection established: {}", peer);

        // late joiners catch up from the snapshot rather than a replay
        let snapshot = self.snapshot_message();
        self.send_server_message(index, &snapshot);
        let history = ServerMessage::ChatHistory {
            lines: self.chat_log.clone(),
        };
        self.send_server_message(index, &history);
        Ok(())
    }

    fn client_readable_event(&mut self, index: usize) {
        loop {
            let message = match self.clients.get_mut(index) {
                Some(client) => client.websocket.read(),
                None => return,
            };
            match message {
                Ok(Message::Text(text)) => self.handle_client_text(index, &text),
                Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                    Ok(text) => {
                        let text = text.to_owned();
                        self.handle_client_text(index, &text);
                    }
                    Err(_) => warn!("non-utf8 binary frame from client {}", index),
                },
                Ok(Message::Close(_)) => {
                    self.drop_client(index);
                    return;
                }
                // ping/pong are answered inside tungstenite
                Ok(_) => (),
                Err(e) => match e.into_non_blocking() {
                    None => return,
                    Some(e) => {
                        debug!("client {} read failed: {}", index, e);
                        self.drop_client(index);
                        return;
                    }
                },
            }
        }
    }

    fn client_writable_event(&mut self, index: usize) {
        let client = match self.clients.get_mut(index) {
            Some(client) => client,
            None => return,
        };
        match client.websocket.flush() {
            Ok(()) => {
                if let Err(e) = self.poll.registry().reregister(
                    client.websocket.get_mut(),
                    client_conn_token(index),
                    Interest::READABLE,
                ) {
                    warn!("reregister failed for client {}: {}", index, e);
                }
            }
            Err(e) => match e.into_non_blocking() {
                None => (),
                Some(e) => {
                    debug!("client {} flush failed: {}", index, e);
                    self.drop_client(index);
                }
            },
        }
    }

    fn handle_client_text(&mut self, index: usize, text: &str) {
        let message: ClientMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("badly formatted message from client {}: {}", index, e);
                return;
            }
        };
        debug!("client {} sent {:?}", index, message);
        self.handle_intent(index, message);
    }

    fn handle_intent(&mut self, index: usize, message: ClientMessage) {
        let participant = ParticipantId(index);
        match message {
            ClientMessage::SetIdentity { name } => {
                match self.clients.get_mut(index) {
                    Some(client) => client.name = Some(name),
                    None => return,
                }
                self.session.join(participant);
                self.broadcast_roster();
                self.broadcast_session_state();
            }
            ClientMessage::ChooseSeat { seat } => {
                match self.session.choose_seat(participant, seat) {
                    Ok(()) => self.broadcast_session_state(),
                    // seat conflicts are dropped without a reply, the
                    // broadcast state already shows who holds what
                    Err(reason) => info!("seat request from client {} refused: {}", index, reason),
                }
            }
            ClientMessage::MarkReady => match self.session.mark_ready(participant) {
                Ok(started) => {
                    if started {
                        info!("both seats ready, game on");
                    }
                    self.broadcast_session_state();
                }
                Err(reason) => info!("ready from client {} ignored: {}", index, reason),
            },
            ClientMessage::SubmitMove {
                piece,
                to,
                en_passant,
            } => match self.session.submit_move(participant, piece, to) {
                Ok(outcome) => {
                    if outcome.en_passant != en_passant {
                        debug!(
                            "client {} mislabelled the capture kind, engine ruling stands",
                            index
                        );
                    }
                    info!("{:?} moved to {}", outcome.mover, outcome.to);
                    let board = ServerMessage::BoardChanged {
                        pieces: self.session.board().pieces().to_vec(),
                    };
                    self.broadcast(&board);
                    self.broadcast_session_state();
                }
                Err(reason) => {
                    info!("move from client {} rejected: {}", index, reason);
                    self.send_server_message(index, &ServerMessage::MoveRejected { reason });
                }
            },
            ClientMessage::RequestSnapshot => {
                let snapshot = self.snapshot_message();
                self.send_server_message(index, &snapshot);
            }
            ClientMessage::Chat { message } => {
                let from = match self.clients.get(index).and_then(|c| c.name.clone()) {
                    Some(name) => name,
                    None => {
                        info!("chat from unnamed client {} dropped", index);
                        return;
                    }
                };
                let line = ChatLine { from, message };
                self.chat_log.push(line.clone());
                self.broadcast(&ServerMessage::Chat { line });
            }
        }
    }

    fn drop_client(&mut self, index: usize) {
        if !self.clients.contains(index) {
            return;
        }
        let mut client = self.clients.remove(index);
        let _ = self.poll.registry().deregister(client.websocket.get_mut());
        info!("connection closed: client {}", index);

        self.session.disconnect(ParticipantId(index));
        if client.name.is_some() {
            self.broadcast_roster();
            self.broadcast_session_state();
        }
    }

    fn user_entry(&self, participant: ParticipantId) -> Option<UserEntry> {
        let client = self.clients.get(participant.0)?;
        client.name.as_ref().map(|name| UserEntry {
            id: participant.0 as u64,
            name: name.clone(),
        })
    }

    fn session_view(&self) -> SessionView {
        SessionView {
            white: self
                .session
                .seat(PieceColour::White)
                .and_then(|p| self.user_entry(p)),
            black: self
                .session
                .seat(PieceColour::Black)
                .and_then(|p| self.user_entry(p)),
            spectators: self
                .session
                .spectators()
                .iter()
                .filter_map(|&p| self.user_entry(p))
                .collect(),
            turn: self.session.turn(),
            white_ready: self.session.ready(PieceColour::White),
            black_ready: self.session.ready(PieceColour::Black),
            phase: self.session.phase(),
        }
    }

    fn snapshot_message(&self) -> ServerMessage {
        ServerMessage::Snapshot {
            pieces: self.session.board().pieces().to_vec(),
            session: self.session_view(),
        }
    }

    fn roster_message(&self) -> ServerMessage {
        let users = self
            .clients
            .iter()
            .filter_map(|(index, client)| {
                client.name.as_ref().map(|name| UserEntry {
                    id: index as u64,
                    name: name.clone(),
                })
            })
            .collect();
        ServerMessage::RosterChanged { users }
    }

    fn broadcast_roster(&mut self) {
        let message = self.roster_message();
        self.broadcast(&message);
    }

    fn broadcast_session_state(&mut self) {
        let message = ServerMessage::SessionStateChanged {
            session: self.session_view(),
        };
        self.broadcast(&message);
    }

    fn broadcast(&mut self, message: &ServerMessage) {
        let encoded = encode(message);
        let indices: Vec<usize> = self.clients.iter().map(|(index, _)| index).collect();
        for index in indices {
            self.send_client_message(index, encoded.clone());
        }
    }

    fn send_server_message(&mut self, index: usize, message: &ServerMessage) {
        self.send_client_message(index, encode(message));
    }

    fn send_client_message(&mut self, index: usize, message: String) {
        let client = match self.clients.get_mut(index) {
            Some(client) => client,
            None => return,
        };

        let result = client
            .websocket
            .write(Message::text(message))
            .and_then(|()| client.websocket.flush());
        match result {
            Ok(()) => (),
            Err(e) => match e.into_non_blocking() {
                // the socket is full; finish the flush when it drains
                None => {
                    if let Err(e) = self.poll.registry().reregister(
                        client.websocket.get_mut(),
                        client_conn_token(index),
                        Interest::READABLE | Interest::WRITABLE,
                    ) {
                        warn!("reregister failed for client {}: {}", index, e);
                    }
                }
                Some(e) => warn!("error sending to client {}: {}", index, e),
            },
        }
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("USAGE: coordinator configpath");
        std::process::exit(1);
    }

    let config = Config::from_file(&args[1]);

    let poll = Poll::new().expect("could not create poll");
    let mut listener = TcpListener::bind(config.host).expect("could not bind to host");
    poll.registry()
        .register(&mut listener, SERVER, Interest::READABLE)
        .expect("could not register listener");
    info!("listening on {}", config.host);

    let mut events = Events::with_capacity(1024);

    let mut state = State {
        poll,
        listener,
        clients: Slab::new(),
        session: Session::new(),
        chat_log: Vec::new(),
    };

    loop {
        state.poll.poll(&mut events, None).expect("poll failed");

        for event in events.iter() {
            match event.token() {
                SERVER => state.accept_clients(),
                client @ Token(_) if is_client(client) => {
                    let index = client_conn_untoken(client);
                    if event.is_readable() {
                        state.client_readable_event(index);
                    }
                    if event.is_writable() {
                        state.client_writable_event(index);
                    }
                }
                Token(_) => (),
            }
        }
    }
}
