//! Operator command parser for the chat surface.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Start,
    Help,
    Register { secret: Option<String> },
    Login { secret: Option<String> },
    Logout,
    /// `/task` with no text arms a prompt; the next plain message becomes
    /// the task body.
    Task { text: Option<String> },
    Approve,
    Cancel,
    Screenshot,
    Shortcut { name: Option<String> },
    Changes,
    Accept { id: Option<String> },
    Reject { id: Option<String> },
    Propose { data: Option<String> },
    Status,
    Unknown { command: String },
}

/// Returns `None` for plain text (not a slash command).
pub fn parse(input: &str) -> Option<OperatorCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };
    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    };

    Some(match head {
        "/start" => OperatorCommand::Start,
        "/help" => OperatorCommand::Help,
        "/register" => OperatorCommand::Register { secret: argument },
        "/login" => OperatorCommand::Login { secret: argument },
        "/logout" => OperatorCommand::Logout,
        "/task" => OperatorCommand::Task { text: argument },
        "/approve" => OperatorCommand::Approve,
        "/cancel" => OperatorCommand::Cancel,
        "/screenshot" => OperatorCommand::Screenshot,
        "/shortcut" => OperatorCommand::Shortcut { name: argument },
        "/changes" => OperatorCommand::Changes,
        "/accept" => OperatorCommand::Accept { id: argument },
        "/reject" => OperatorCommand::Reject { id: argument },
        "/propose" => OperatorCommand::Propose { data: argument },
        "/status" => OperatorCommand::Status,
        other => OperatorCommand::Unknown {
            command: other.to_string(),
        },
    })
}

pub const HELP_TEXT: &str = "deskhand commands:
/register <secret> - register with the shared secret
/login <secret> - log in
/logout - log out
/task [text] - submit a task for approval
/approve - execute the pending task
/cancel - discard the pending task
/screenshot - capture the screen now
/shortcut [name] - run a named shortcut or a combo like alt+f4
/changes - list recorded changes
/accept <id> - accept a change
/reject <id> - reject a change
/propose <json> - record a change proposal
/status - runtime status
/help - this help

examples:
/task напиши Hello
/shortcut copy
/accept change_001";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse("напиши hello"), None);
        assert_eq!(parse("  hello /task"), None);
    }

    #[test]
    fn arguments_are_split_from_the_command() {
        assert_eq!(
            parse("/task напиши hello"),
            Some(OperatorCommand::Task {
                text: Some("напиши hello".to_string())
            })
        );
        assert_eq!(parse("/task"), Some(OperatorCommand::Task { text: None }));
        assert_eq!(
            parse("/accept change_002"),
            Some(OperatorCommand::Accept {
                id: Some("change_002".to_string())
            })
        );
        assert_eq!(
            parse("/register sesame"),
            Some(OperatorCommand::Register {
                secret: Some("sesame".to_string())
            })
        );
    }

    #[test]
    fn unknown_slash_commands_are_reported() {
        assert_eq!(
            parse("/frobnicate now"),
            Some(OperatorCommand::Unknown {
                command: "/frobnicate".to_string()
            })
        );
    }
}
