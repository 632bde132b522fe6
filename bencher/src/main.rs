use std::env;
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use log::{info, warn};
use rand::Rng;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect, Message, WebSocket};

use common::{ClientMessage, PieceId, SeatRequest, Square};

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

fn send(websocket: &mut Socket, message: &ClientMessage) {
    let encoded = serde_json::to_string(message).unwrap();
    if let Err(e) = websocket.send(Message::text(encoded)) {
        warn!("send failed: {}", e);
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let host = args.get(1).map(String::as_str).unwrap_or("127.0.0.1:2826");
    let connections: usize = args
        .get(2)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(50);

    let url = url::Url::parse(&format!("ws://{}", host)).expect("invalid host");

    let mut sockets: Vec<Socket> = Vec::with_capacity(connections);
    for i in 0..connections {
        let (mut websocket, _) = connect(url.as_str()).expect("connection failed");

        send(
            &mut websocket,
            &ClientMessage::SetIdentity {
                name: format!("bencher-{}", i),
            },
        );
        send(&mut websocket, &ClientMessage::RequestSnapshot);

        // the first two connections play, the rest spectate
        if i < 2 {
            let seat = if i == 0 {
                SeatRequest::White
            } else {
                SeatRequest::Black
            };
            send(&mut websocket, &ClientMessage::ChooseSeat { seat });
            send(&mut websocket, &ClientMessage::MarkReady);
        }

        sockets.push(websocket);
    }
    info!("{} clients connected to {}", sockets.len(), host);

    let mut rng = rand::thread_rng();
    loop {
        for websocket in sockets.iter_mut().take(2) {
            let message = ClientMessage::SubmitMove {
                piece: PieceId(rng.gen_range(0..32)),
                to: Square {
                    file: rng.gen_range(0..8),
                    rank: rng.gen_range(0..8),
                },
                en_passant: false,
            };
            send(websocket, &message);
            // every submission draws at least one reply; reading it back
            // keeps the server's send queues bounded
            if let Err(e) = websocket.read() {
                warn!("read failed: {}", e);
            }
        }
        thread::sleep(Duration::from_millis(20));
    }
}
