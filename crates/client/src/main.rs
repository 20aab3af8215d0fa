//! Noughts terminal client.

use std::io::{self, BufRead, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use anyhow::{Context, Result, bail};
use clap::Parser;
use noughts_client::render::render;
use noughts_client::{ClientError, ClientGame};
use noughts_wire::{MAX_DATAGRAM_LEN, Message};
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Play tic-tac-toe against a Noughts server
#[derive(Parser, Debug)]
#[command(name = "noughts-client", version, long_about = None)]
struct Args {
    /// Server address
    server_ip: IpAddr,

    /// Server UDP port
    port: u16,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();
    let server = SocketAddr::new(args.server_ip, args.port);

    let local: IpAddr = match server {
        SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };
    let socket = UdpSocket::bind((local, 0)).context("failed to bind UDP socket")?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    let name = prompt(&mut lines, "Enter your name: ")?;
    let mut game = ClientGame::random();
    debug!(session_id = game.session_id(), %server, "starting game");

    let hello = game.hello(name.trim())?;
    send(&socket, server, &hello)?;

    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
    loop {
        let (len, from) = socket.recv_from(&mut buf).context("failed to receive from server")?;
        if from != server {
            warn!(%from, "ignoring datagram from unknown peer");
            continue;
        }
        let reply = match Message::decode(&buf[..len]) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "ignoring malformed reply");
                continue;
            }
        };
        if let Err(e) = game.apply_response(&reply) {
            warn!(error = %e, "ignoring reply");
            continue;
        }

        println!("{}", reply.text);
        println!();
        println!("{}", render(game.board()));

        if game.is_game_over() {
            return Ok(());
        }

        let mv = loop {
            let input = prompt(&mut lines, "Enter your move (1-9): ")?;
            match game.play_key(&input) {
                Ok(mv) => break mv,
                Err(
                    e @ (ClientError::CellOccupied(_)
                    | ClientError::KeyOutOfRange(_)
                    | ClientError::NotANumber(_)),
                ) => {
                    println!("{e}. Try again.");
                }
                Err(e) => return Err(e.into()),
            }
        };
        send(&socket, server, &mv)?;
    }
}

fn prompt(lines: &mut impl Iterator<Item = io::Result<String>>, text: &str) -> Result<String> {
    print!("{text}");
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(line?),
        None => bail!("stdin closed"),
    }
}

fn send(socket: &UdpSocket, server: SocketAddr, message: &Message) -> Result<()> {
    socket
        .send_to(&message.encode(), server)
        .with_context(|| format!("failed to send to {server}"))?;
    Ok(())
}
