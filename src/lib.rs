pub mod commands;
pub mod error;
pub mod services;
pub mod state;

use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use commands::UiCommand;
use error::{ChatSyncError, Result};
use services::chat_channel::run_inbound_loop;
use services::chat_types::ChannelFrame;
use services::{ConfigService, MpscChannel};
use state::AppState;

/// Install the `env_logger` backend. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

/// One line of driver input: a UI command or a raw inbound frame.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DriverInput {
    Command {
        command: UiCommand,
        #[serde(default)]
        id: Option<Value>,
    },
    Frame(ChannelFrame),
}

/// Headless driver. Reads JSON lines from stdin and writes outbound frames,
/// UI notifications and command replies to stdout as JSON lines. Returns
/// once stdin is closed and everything queued has been written.
pub async fn run(config_path: Option<PathBuf>) -> Result<()> {
    let config_service = match config_path {
        Some(path) => ConfigService::load(&path)?,
        None => ConfigService::new()?,
    };
    init_logging(&config_service.get().logging.level);
    log::info!("Using configuration {:?}", config_service.path());

    let (channel, mut outbound_rx) = MpscChannel::new();
    let state = AppState::new(config_service, Arc::new(channel));

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    state.chat.write().await.set_ui_sink(ui_tx);

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<ChannelFrame>();
    let pump = tokio::spawn(run_inbound_loop(inbound_rx, state.incoming_handler()));

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        loop {
            let line = tokio::select! {
                Some(frame) = outbound_rx.recv() => json!({ "outbound": frame }),
                Some(event) = ui_rx.recv() => json!({ "ui": event }),
                Some(reply) = reply_rx.recv() => reply,
                else => break,
            };
            let mut text = line.to_string();
            text.push('\n');
            if let Err(e) = stdout.write_all(text.as_bytes()).await {
                log::error!("Writing to stdout failed: {}", e);
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<DriverInput>(line) {
            Ok(DriverInput::Command { command, id }) => {
                let reply = match commands::dispatch(&state, command).await {
                    Ok(value) => json!({ "id": id, "reply": value }),
                    Err(e) => json!({ "id": id, "error": e }),
                };
                let _ = reply_tx.send(reply);
            }
            Ok(DriverInput::Frame(frame)) => {
                if inbound_tx.send(frame).is_err() {
                    log::error!("Inbound pump stopped; closing");
                    break;
                }
            }
            Err(e) => log::warn!("Ignoring unparseable input line: {}", e),
        }
    }

    log::info!("Input closed, shutting down");
    drop(inbound_tx);
    pump.await
        .map_err(|e| ChatSyncError::ChatError(format!("Inbound pump failed: {}", e)))?;

    // Last senders go with the state; the writer drains and stops.
    drop(reply_tx);
    drop(state);
    writer
        .await
        .map_err(|e| ChatSyncError::ChatError(format!("Output writer failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_input_command() {
        let input: DriverInput = serde_json::from_str(
            r#"{"id": 7, "command": {"type": "send", "conversationId": "c1", "body": "hi"}}"#,
        )
        .unwrap();
        match input {
            DriverInput::Command { command, id } => {
                assert!(matches!(command, UiCommand::Send { .. }));
                assert_eq!(id, Some(json!(7)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_driver_input_frame() {
        let input: DriverInput = serde_json::from_str(
            r#"{"event": "messageDeleted", "payload": {"chatId": "c1", "messageId": "m1"}}"#,
        )
        .unwrap();
        match input {
            DriverInput::Frame(frame) => assert_eq!(frame.event, "messageDeleted"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
