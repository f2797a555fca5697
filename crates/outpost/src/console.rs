//! The operator console: a read-dispatch loop over console lines.
//!
//! Lines are handled strictly one at a time. Each line is parsed into a
//! [`Command`], run to completion, and its [`Reply`] is written before
//! the next line is read. A failed command logs one warning and the loop
//! carries on; only `exit` or end of input ends it.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Command, ConsoleError, OutpostError, ServerConfig, ServerState, display, moderation};

const WIPE_PROMPT: &str =
    "WARNING! This action will delete all player data. Do you want to proceed? (Y/N)";

/// ANSI clear-screen and cursor-home.
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// What a handled line asks the console to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing to print beyond the log line the action emitted.
    Done,
    /// Print these lines.
    Lines(Vec<String>),
    Clear,
    /// Print the prompt; the next line answers it.
    Confirm(String),
    /// Stop reading input.
    Exit,
}

/// Console state carried between lines.
pub struct Console {
    state: Arc<ServerState>,
    config_path: Option<PathBuf>,
    pending_wipe: bool,
}

impl Console {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self {
            state,
            config_path: None,
            pending_wipe: false,
        }
    }

    /// The file `reload` re-reads.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// `true` while a `wipe` is waiting for its Y/N answer.
    pub fn is_confirming(&self) -> bool {
        self.pending_wipe
    }

    /// Handles one line and logs a warning if it fails.
    pub async fn dispatch(&mut self, line: &str) -> Reply {
        match self.execute(line).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("{e}");
                Reply::Done
            }
        }
    }

    /// Handles one line.
    ///
    /// # Errors
    /// Any [`ConsoleError`]. None of them leave partial state behind.
    pub async fn execute(&mut self, line: &str) -> Result<Reply, ConsoleError> {
        if std::mem::take(&mut self.pending_wipe) {
            return self.answer_wipe(line).await;
        }

        let Some(command) = Command::parse(line)? else {
            return Ok(Reply::Done);
        };
        tracing::debug!(?command, "console command");

        let state = self.state.as_ref();
        Ok(match command {
            // -- Display --
            Command::Help => Reply::Lines(display::help()),
            Command::Settings => Reply::Lines(display::settings(&state.config().await)),
            Command::Status => Reply::Lines(display::status(state).await),
            Command::EventList => Reply::Lines(display::event_list()),
            Command::Chat => Reply::Lines(display::chat(&*state.chat().lock().await)),
            Command::List => Reply::Lines(display::player_list(&*state.registry().lock().await)),
            Command::Settlements => Reply::Lines(display::settlements(&*state.roster().lock().await)),
            Command::BanList => Reply::Lines(display::ban_list(&*state.registry().lock().await)),
            Command::AdminList => Reply::Lines(display::admin_list(&*state.registry().lock().await)),
            Command::Whitelist => Reply::Lines(display::whitelist(&state.config().await)),
            Command::Clear => Reply::Clear,
            Command::Reload => {
                self.reload().await?;
                Reply::Done
            }

            // -- Communication --
            Command::Say { text } => done(moderation::say(state, &text).await)?,
            Command::Broadcast { text } => done(moderation::broadcast(state, &text).await)?,
            Command::Notify { username, text } => {
                done(moderation::notify(state, &username, &text).await)?
            }

            // -- Interaction --
            Command::Invoke { username, event } => {
                done(moderation::invoke(state, &username, &event).await)?
            }
            Command::Plague { event } => done(moderation::plague(state, &event).await)?,
            Command::GiveItem { username, item } => {
                done(moderation::give_item(state, &username, item).await)?
            }
            Command::GiveItemAll { item } => done(moderation::give_item_all(state, item).await)?,
            Command::Protect { username } => done(moderation::protect(state, &username).await)?,
            Command::Deprotect { username } => done(moderation::deprotect(state, &username).await)?,
            Command::Immunize { username } => done(moderation::immunize(state, &username).await)?,
            Command::Deimmunize { username } => {
                done(moderation::deimmunize(state, &username).await)?
            }

            // -- Admin control --
            Command::Investigate { username } => {
                Reply::Lines(moderation::investigate(state, &username).await?)
            }
            Command::Kick { username } => done(moderation::kick(state, &username).await)?,
            Command::Ban { username } => done(moderation::ban(state, &username).await)?,
            Command::Pardon { username } => done(moderation::pardon(state, &username).await)?,
            Command::Promote { username } => done(moderation::promote(state, &username).await)?,
            Command::Demote { username } => done(moderation::demote(state, &username).await)?,
            Command::Wipe => {
                self.pending_wipe = true;
                Reply::Confirm(WIPE_PROMPT.to_string())
            }
            Command::Exit => {
                moderation::exit(state).await?;
                Reply::Exit
            }
        })
    }

    async fn answer_wipe(&mut self, line: &str) -> Result<Reply, ConsoleError> {
        if line.trim().eq_ignore_ascii_case("y") {
            moderation::wipe(&self.state).await?;
        } else {
            tracing::info!("Wipe Cancelled");
        }
        Ok(Reply::Done)
    }

    async fn reload(&self) -> Result<(), ConsoleError> {
        let path = self.config_path.as_deref().ok_or(ConsoleError::NoConfigFile)?;
        let fresh = ServerConfig::load(path).map_err(|e| ConsoleError::ReloadFailed(e.to_string()))?;
        self.state.reload_config(fresh).await;
        tracing::info!(path = %path.display(), "Loaded Settings File");
        Ok(())
    }

    /// Reads lines from `input` until `exit` or end of input, writing
    /// replies to `output`.
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> Result<(), OutpostError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.map_err(OutpostError::ConsoleIo)? {
            let text = match self.dispatch(&line).await {
                Reply::Done => continue,
                Reply::Lines(lines) => {
                    let mut text = lines.join("\n");
                    text.push('\n');
                    text
                }
                Reply::Clear => CLEAR_SCREEN.to_string(),
                Reply::Confirm(prompt) => format!("{prompt}\n"),
                Reply::Exit => break,
            };
            output
                .write_all(text.as_bytes())
                .await
                .map_err(OutpostError::ConsoleIo)?;
            output.flush().await.map_err(OutpostError::ConsoleIo)?;
        }
        Ok(())
    }
}

fn done(result: Result<(), ConsoleError>) -> Result<Reply, ConsoleError> {
    result.map(|()| Reply::Done)
}
