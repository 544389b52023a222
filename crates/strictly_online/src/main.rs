//! Strictly Online - terminal client
//!
//! Logs in over REST, then plays a game over the session WebSocket.

#![warn(missing_docs)]

mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use cli::{Cli, Command, PlayArgs};
use strictly_online::{
    AuthSession, ClientConfig, ConnectionState, Identity, RestApi, RoomApi, Session,
    SessionController, Transport,
};
use strictly_tictactoe::Position;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap reads env-backed options
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let api = Arc::new(RestApi::new(config.server().api_url().clone()));
    let auth = login(&api, cli.email, cli.password).await?;

    match cli.command {
        Command::Rooms => list_rooms(api.as_ref(), auth.token()).await,
        Command::Play(args) => play(&config, api, &auth, args).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let config = match path {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    Ok(config.with_env_overrides())
}

#[instrument(skip_all)]
async fn login(
    api: &RestApi,
    email: Option<String>,
    password: Option<String>,
) -> Result<AuthSession> {
    let email = email.context("--email or STRICTLY_EMAIL is required")?;
    let password = password.context("--password or STRICTLY_PASSWORD is required")?;
    let auth = api.login(&email, &password).await?;
    info!(user_id = %auth.user().id(), "Authenticated");
    Ok(auth)
}

async fn list_rooms(api: &dyn RoomApi, token: &str) -> Result<()> {
    let rooms = api.get_rooms(token).await?;
    if rooms.is_empty() {
        println!("No rooms yet.");
    }
    for room in rooms {
        println!(
            "{:<24} {:<20} {:<9} {}/2",
            room.id(),
            room.name(),
            room.status(),
            room.players().len()
        );
    }
    Ok(())
}

async fn play(
    config: &ClientConfig,
    api: Arc<RestApi>,
    auth: &AuthSession,
    args: PlayArgs,
) -> Result<()> {
    let transport = Transport::websocket(config.server().ws_url().clone(), config.policy());
    let identity = Identity::new(auth.user().id().clone(), auth.token().clone());
    let mut controller = SessionController::new(transport, api, identity);

    if let Err(e) = controller.connect().await {
        warn!(error = %e, "Game server unreachable, retrying in the background");
    }

    let outcome = match pick_room(&controller, args).await {
        Ok(()) => interact(&controller).await,
        Err(e) => Err(e),
    };
    controller.disconnect().await;
    outcome
}

async fn pick_room(controller: &SessionController, args: PlayArgs) -> Result<()> {
    if let Some(room_id) = args.room {
        if !controller.join_room(&room_id) {
            bail!("Could not send join request for room {}", room_id);
        }
        return Ok(());
    }

    if let Some(name) = args.create {
        controller.create_room(&name).await;
        if let Some(error) = controller.error() {
            bail!(error);
        }
        let user_id = controller.identity().user_id();
        let room = controller
            .rooms()
            .into_iter()
            .filter(|room| room.name() == &name && room.created_by() == user_id)
            .max_by_key(|room| *room.created_at())
            .ok_or_else(|| anyhow!("Room {} not found after creating it", name))?;
        if !controller.join_room(room.id()) {
            bail!("Could not send join request for room {}", room.id());
        }
        return Ok(());
    }

    // --random, or nothing chosen
    if !controller.join_random_room().await {
        bail!(
            controller
                .error()
                .unwrap_or_else(|| "Failed to join random room".to_string())
        );
    }
    Ok(())
}

async fn interact(controller: &SessionController) -> Result<()> {
    let user_id = controller.identity().user_id().clone();
    let mut updates = controller.watch();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown: Option<(Session, Option<String>)> = None;

    println!("Enter a cell (0-8, or a name like 'center'); 'leave' quits.");
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                let view = (state.session().clone(), state.error().clone());
                if shown.as_ref() != Some(&view) {
                    render(controller, &view.0, view.1.as_deref(), &user_id);
                    shown = Some(view);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    controller.leave_room();
                    break;
                };
                match line.trim() {
                    "" => continue,
                    "leave" | "quit" | "q" => {
                        controller.leave_room();
                        break;
                    }
                    input => match Position::from_label_or_number(input) {
                        Some(position) => {
                            if !controller.make_move(position.to_index()) {
                                println!("{} is not playable right now.", position);
                            }
                        }
                        None => println!("Unrecognised input: {}", input),
                    },
                }
            }
        }
    }
    Ok(())
}

fn render(
    controller: &SessionController,
    session: &Session,
    error: Option<&str>,
    user_id: &str,
) {
    println!();
    if let Some(room_id) = controller.current_room() {
        match session.opponent_of(user_id) {
            Some(opponent) => println!("Room {} against {}", room_id, opponent),
            None => println!("Room {}", room_id),
        }
    }
    let connection = controller.connection_state();
    if connection != ConnectionState::Connected {
        println!("({})", connection);
    }
    println!("{}", session.board().display());
    println!("{}", session.status_line(user_id));
    let my_turn = session.seat(user_id).mark() == Some(*session.turn());
    if my_turn && !session.is_terminal() {
        let open: Vec<String> = Position::valid_moves(session.board())
            .iter()
            .map(|position| position.to_index().to_string())
            .collect();
        println!("Open cells: {}", open.join(" "));
    }
    if let Some(error) = error {
        println!("! {}", error);
    }
}
