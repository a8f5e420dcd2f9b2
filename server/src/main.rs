use clap::Parser;
use log::info;
use server::config::Args;
use server::game::GameState;
use server::network::Server;
use server::persistence::SnapshotStore;
use shared::Terrain;

/// Parses command-line arguments, restores or generates the world, then runs
/// the server until Ctrl-C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let store = SnapshotStore::new(&args.save_path);

    let mut game = GameState::new(Terrain::default(), args.tuning(), args.seed);
    match store.load() {
        Some(snapshot) => game.restore(snapshot),
        None => {
            info!("Generating a fresh world");
            game.generate_world();
        }
    }

    let mut server = Server::new(&args.address(), args.server_config(), game, store).await?;
    server.run().await?;

    Ok(())
}
