use clap::Parser;
use shared::{ClientMessage, ServerEvent};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout_at, Instant};

/// Scripted protocol driver: connects, walks a small square, swings at the
/// tile ahead, tries a craft and a placement, then disconnects.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address to connect to
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,
    /// Session name; the server assigns a guest name when omitted
    #[clap(short, long)]
    name: Option<String>,
}

async fn send(
    socket: &UdpSocket,
    server: SocketAddr,
    message: &ClientMessage,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("-> {:?}", message);
    socket.send_to(&serde_json::to_vec(message)?, server).await?;
    Ok(())
}

/// Prints every event that arrives within `window`, summarising position
/// updates to one line each.
async fn drain(socket: &UdpSocket, window: Duration) {
    let mut buf = vec![0u8; 65536];
    let deadline = Instant::now() + window;
    while let Ok(Ok((len, _))) = timeout_at(deadline, socket.recv_from(&mut buf)).await {
        match serde_json::from_slice::<ServerEvent>(&buf[..len]) {
            Ok(ServerEvent::PositionUpdate {
                x,
                y,
                time,
                hp,
                last_seq_id,
                monsters,
                ..
            }) => println!(
                "<- position ({:.1}, {:.1}) hp {} seq {} time {:.3} monsters {}",
                x,
                y,
                hp,
                last_seq_id,
                time,
                monsters.len()
            ),
            Ok(ServerEvent::WorldObjects { objects }) => {
                println!("<- world_objects ({} objects)", objects.len())
            }
            Ok(event) => println!("<- {:?}", event),
            Err(e) => println!("Failed to decode event: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    send(&socket, args.server, &ClientMessage::Connect { name: args.name }).await?;
    drain(&socket, Duration::from_millis(500)).await;

    let path = [(40.0, 0.0), (40.0, 40.0), (0.0, 40.0), (0.0, 0.0)];
    for (seq_id, &(x, y)) in (1u64..).zip(path.iter()) {
        send(&socket, args.server, &ClientMessage::RequestMove { x, y, seq_id }).await?;
        drain(&socket, Duration::from_millis(200)).await;
    }

    send(&socket, args.server, &ClientMessage::Interact { x: 1.0, y: 0.0 }).await?;
    drain(&socket, Duration::from_millis(300)).await;

    let actions = [
        ClientMessage::CraftItem {
            recipe: "Pickaxe".to_string(),
        },
        ClientMessage::PlaceObject {
            kind: "Crafting Table".to_string(),
            x: 2.0,
            y: 2.0,
        },
        ClientMessage::PickupObject { x: 2.0, y: 2.0 },
        ClientMessage::CollectItem {
            item: "Crafting Table".to_string(),
        },
        ClientMessage::Heartbeat,
    ];
    for action in &actions {
        send(&socket, args.server, action).await?;
        drain(&socket, Duration::from_millis(300)).await;
    }

    sleep(Duration::from_millis(100)).await;
    send(&socket, args.server, &ClientMessage::Disconnect).await?;
    println!("Test client finished");
    Ok(())
}
