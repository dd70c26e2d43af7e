use std::error::Error;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use ninja_notes::common::{ChatCommand, NoteCommand, NoteEvent, NoticeLevel, Role};
use ninja_notes::config::{self, AppConfig};
use ninja_notes::coordinator::DeliveryCoordinator;
use ninja_notes::network::NoteNode;
use ninja_notes::presenter::{ChannelPresenter, LogPresenter, Presenter};
use ninja_notes::roster::Roster;
use ninja_notes::storage::{self, KeyValueStore, MemoryStore, SettingsDatabase};
use ninja_notes::throttle::SystemClock;
use ninja_notes::ui::NotesApp;

#[derive(Parser)]
#[command(
    name = "ninja_notes",
    version,
    about = "Secret player-to-GM notes over a local P2P table"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Participant id to run as (overrides the config file)
    #[arg(long)]
    identity: Option<String>,
    /// Run without a window and read chat commands from stdin
    #[arg(long)]
    headless: bool,
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Write a config file with default settings and exit
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    if cli.mode == Some(Mode::InitConfig) {
        config::save_config(&cli.config, &AppConfig::default())?;
        log::info!("Wrote default config to {}", cli.config);
        return Ok(());
    }

    let mut app_config = config::load_config(&cli.config);
    if let Some(identity) = cli.identity {
        app_config.identity = identity;
    }

    let roster = Roster::from_config(&app_config);
    let Some(local) = roster.local().cloned() else {
        return Err(format!(
            "participant `{}` is not declared in {}",
            app_config.identity, cli.config
        )
        .into());
    };

    // UI -> node
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // node -> UI
    let (event_tx, event_rx) = mpsc::channel(100);

    let headless = cli.headless || !display_available();
    let presenter: Box<dyn Presenter> = if headless {
        Box::new(LogPresenter::new(app_config.play_sound))
    } else {
        Box::new(ChannelPresenter::new(event_tx.clone(), app_config.play_sound))
    };

    let coordinator = DeliveryCoordinator::new(
        local.id.clone(),
        local.role,
        &app_config,
        open_store(&app_config),
        presenter,
        Arc::new(SystemClock),
    );
    let node = NoteNode::new(
        coordinator,
        roster,
        event_tx,
        cmd_rx,
        app_config.listen_addr.clone(),
    );

    log::info!("Starting as {} ({:?})", local.name, local.role);
    tokio::spawn(async move {
        if let Err(err) = node.run().await {
            log::error!("Note node terminated: {err}");
        }
    });

    if headless {
        run_headless(cmd_tx, event_rx).await;
        return Ok(());
    }

    run_window(local.role, app_config.auto_open_panel, cmd_tx, event_rx)
        .map_err(|err| format!("window failed: {err}"))?;
    Ok(())
}

fn open_store(config: &AppConfig) -> Box<dyn KeyValueStore> {
    if let Err(err) = storage::ensure_parent_dir(&config.database_path) {
        log::warn!("Unable to create data directory: {err}");
    }
    match SettingsDatabase::with_path(&config.database_path) {
        Ok(db) => Box::new(db),
        Err(err) => {
            log::warn!(
                "Failed to open {} ({err}); notes will not outlive this session",
                config.database_path
            );
            Box::new(MemoryStore::new())
        }
    }
}

fn display_available() -> bool {
    if cfg!(target_os = "linux") {
        std::env::var_os("DISPLAY").is_some() || std::env::var_os("WAYLAND_DISPLAY").is_some()
    } else {
        true
    }
}

fn run_window(
    role: Role,
    auto_open_panel: bool,
    command_sender: mpsc::Sender<NoteCommand>,
    event_receiver: mpsc::Receiver<NoteEvent>,
) -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions::default();

    eframe::run_native(
        "Ninja Notes",
        options,
        Box::new(move |cc| {
            Ok(Box::new(NotesApp::new(
                cc,
                role,
                auto_open_panel,
                command_sender,
                event_receiver,
            )))
        }),
    )
}

/// Stdin in, log out. Plain lines are sent as notes.
async fn run_headless(
    command_sender: mpsc::Sender<NoteCommand>,
    mut event_receiver: mpsc::Receiver<NoteEvent>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) if !line.trim().is_empty() => {
                        let command = ChatCommand::parse(&line)
                            .into_note_command()
                            .unwrap_or(NoteCommand::SendNote(line));
                        if command_sender.send(command).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(_)) => {}
                    Ok(None) => stdin_open = false,
                    Err(err) => {
                        log::warn!("Failed to read stdin: {err}");
                        stdin_open = false;
                    }
                }
            }
            event = event_receiver.recv() => {
                match event {
                    Some(event) => log_event(event),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Received shutdown signal, stopping...");
                break;
            }
        }
    }
}

fn log_event(event: NoteEvent) {
    match event {
        NoteEvent::Notice {
            level: NoticeLevel::Info,
            text,
        } => log::info!("{text}"),
        NoteEvent::Notice {
            level: NoticeLevel::Warn,
            text,
        } => log::warn!("{text}"),
        NoteEvent::RosterChanged(participants) => {
            let online: Vec<&str> = participants
                .iter()
                .filter(|participant| participant.active)
                .map(|participant| participant.name.as_str())
                .collect();
            log::info!("Online: {}", online.join(", "));
        }
        NoteEvent::HistoryChanged(notes) => log::debug!("History holds {} notes", notes.len()),
        NoteEvent::NoteArrived(note) => log::info!("Note from {}", note.sender_name),
    }
}
