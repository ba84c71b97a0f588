//! `presenter`: broadcast from the terminal.
//!
//! Usage: `presenter [--offline] <session-link>`

mod config;
mod shell;

use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use presenter_api::{
    ApiResult, CommentPoster, HttpCommentPoster, HttpTerminationNotifier, TerminationNotifier,
    TerminationRequest,
};
use presenter_capture::{CaptureDevice, CommandDevice, SyntheticDevice};
use presenter_engine::{
    create_engine, Collaborators, CredentialStore, FileCredentialStore, StaticCredentials,
};
use presenter_ipc::{command_channel, event_channel, SessionCommand, SessionEvent};
use presenter_transport::{EventChannel, MemoryChannel, SocketIoChannel};

use crate::config::{parse_session_link, AppConfig};
use crate::shell::{describe_event, parse_line, Input, HELP};

const DEFAULT_LOG_FILTER: &str = concat!(
    "presenter=debug,presenter_engine=debug,presenter_capture=debug,",
    "presenter_transport=debug,presenter_api=debug"
);

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Stand-in for the HTTP services when running offline.
struct OfflineApi;

#[async_trait]
impl CommentPoster for OfflineApi {
    async fn post_comment(&self, message: &str) -> ApiResult<()> {
        info!(%message, "Offline: comment not uploaded");
        Ok(())
    }
}

#[async_trait]
impl TerminationNotifier for OfflineApi {
    async fn notify_end(&self, request: &TerminationRequest) -> ApiResult<()> {
        info!(session_id = %request.session_id, "Offline: end of session not announced");
        Ok(())
    }
}

fn build_collaborators(config: &AppConfig, offline: bool) -> Result<Collaborators> {
    let device: Arc<dyn CaptureDevice> = match config.capture_command {
        Some(ref line) => match CommandDevice::from_command_line(line) {
            Some(device) => Arc::new(device),
            None => bail!("Capture command is empty"),
        },
        None => {
            warn!("No capture command configured, using synthetic media");
            Arc::new(SyntheticDevice::new())
        }
    };

    let credentials: Arc<dyn CredentialStore> = match config.credentials_path {
        Some(ref path) => Arc::new(FileCredentialStore::new(path)),
        None => Arc::new(StaticCredentials::empty()),
    };

    if offline {
        let api = Arc::new(OfflineApi);
        return Ok(Collaborators {
            streaming_channel: Arc::new(MemoryChannel::new()),
            comment_channel: Arc::new(MemoryChannel::new()),
            device,
            credentials,
            poster: api.clone(),
            notifier: api,
        });
    }

    let client = reqwest::Client::new();
    let streaming_channel: Arc<dyn EventChannel> = Arc::new(SocketIoChannel::new("streaming"));
    let comment_channel: Arc<dyn EventChannel> = Arc::new(SocketIoChannel::new("comments"));

    Ok(Collaborators {
        streaming_channel,
        comment_channel,
        device,
        credentials,
        poster: Arc::new(HttpCommentPoster::new(
            client.clone(),
            &config.session.comment_service,
        )?),
        notifier: Arc::new(HttpTerminationNotifier::new(
            client,
            &config.session.composition_service,
        )?),
    })
}

fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to load .env");
        }
    }
    init_logging();

    let mut offline = false;
    let mut link = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--offline" => offline = true,
            _ if link.is_none() => link = Some(arg),
            _ => bail!("Unexpected argument: {arg}"),
        }
    }
    let Some(link) = link else {
        bail!("Usage: presenter [--offline] <session-link>");
    };

    let identity = parse_session_link(&link)?;
    let config = AppConfig::from_env()?;
    info!(
        presenter_id = %identity.presenter_id,
        session_id = %identity.session_id,
        offline,
        "Presenter starting"
    );

    let collaborators = build_collaborators(&config, offline)?;
    let (command_tx, command_rx) = command_channel();
    let (event_tx, event_rx) = event_channel();

    let mut engine = create_engine(command_rx, event_tx, config.session, identity, collaborators)?;
    let engine_thread = thread::spawn(move || {
        info!("Engine thread starting");
        engine.run();
        info!("Engine thread stopped");
    });

    let printer = thread::spawn(move || {
        for event in event_rx.iter() {
            if let Some(line) = describe_event(&event) {
                println!("{line}");
            }
            if matches!(event, SessionEvent::Shutdown) {
                break;
            }
        }
    });

    println!("{HELP}");
    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        match parse_line(&line) {
            Ok(Input::Command(command)) => {
                let quit = command == SessionCommand::Shutdown;
                command_tx
                    .send(command)
                    .context("Engine is no longer running")?;
                if quit {
                    break;
                }
            }
            Ok(Input::Help) => println!("{HELP}"),
            Ok(Input::Empty) => {}
            Err(message) => println!("{message}\n{HELP}"),
        }
    }

    // End of input stops any live session too.
    drop(command_tx);
    if engine_thread.join().is_err() {
        bail!("Engine thread panicked");
    }
    let _ = printer.join();

    info!("Presenter stopped");
    Ok(())
}
