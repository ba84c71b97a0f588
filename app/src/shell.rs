//! Line-oriented command shell.

use presenter_ipc::{SessionCommand, SessionEvent, SessionState};

/// Text shown for `help` and unknown input.
pub const HELP: &str = "commands: start | stop | say <text> | comments | state | quit";

/// What a line of input asks for.
#[derive(Debug, PartialEq)]
pub enum Input {
    /// Forward a command to the engine.
    Command(SessionCommand),

    /// Print [`HELP`].
    Help,

    /// Nothing to do.
    Empty,
}

/// Parse one line of input.
pub fn parse_line(line: &str) -> Result<Input, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "" => return Ok(Input::Empty),
        "help" => return Ok(Input::Help),
        "start" => SessionCommand::Start,
        "stop" => SessionCommand::Stop,
        "comments" => SessionCommand::GetComments,
        "state" => SessionCommand::GetState,
        "quit" | "exit" => SessionCommand::Shutdown,
        "say" if rest.is_empty() => return Err("say needs a message".to_string()),
        "say" => SessionCommand::PostComment(rest.to_string()),
        other => return Err(format!("unknown command '{other}'")),
    };

    Ok(Input::Command(command))
}

/// Render an event for the terminal. `None` for events not worth a line.
pub fn describe_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Ready => Some("ready".to_string()),
        SessionEvent::StateChanged { previous, current } if previous == current => {
            Some(format!("state: {}", describe_state(current)))
        }
        SessionEvent::StateChanged { current, .. } => match current.as_ref() {
            SessionState::Initializing { phase } => Some(format!("{}...", phase.name())),
            SessionState::Stopping { phase } => Some(format!("{}...", phase.name())),
            state => Some(format!("state: {}", describe_state(state))),
        },
        SessionEvent::CommentReceived(comment) => Some(format!("> {}", comment.display_text())),
        SessionEvent::Comments(comments) if comments.is_empty() => {
            Some("no comments yet".to_string())
        }
        SessionEvent::Comments(comments) => Some(
            comments
                .iter()
                .map(|comment| format!("> {}", comment.display_text()))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        SessionEvent::Error { kind, message, .. } => {
            Some(format!("error ({}): {}", kind.name(), message))
        }
        SessionEvent::Shutdown => None,
    }
}

fn describe_state(state: &SessionState) -> String {
    match state {
        SessionState::Streaming { identity } => format!(
            "streaming as {} (session {})",
            identity.presenter_id, identity.session_id
        ),
        SessionState::Error { message, .. } => format!("error: {message}"),
        other => other.name().to_lowercase(),
    }
}
