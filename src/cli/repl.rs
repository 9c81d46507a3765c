//! Interactive session.

use crate::agents::Director;
use crate::cli::output::{OutputFormat, format_chat, format_dashboard, format_hierarchy};
use crate::error::Result;
use std::io::{BufRead, Write};

const BANNER: &str = "director-rs interactive session. Type `help` for commands, `quit` to exit.";

const HELP: &str = "Commands:
  dashboard   executive dashboard
  status      hierarchy and memory usage
  strategy    cross-domain strategic overview
  history     recent conversation
  clear       clear conversation memory at every level
  quit        exit
Anything else is sent as a message.
";

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Blank line.
    Empty,
    /// Leave the session.
    Quit,
    /// Show the command list.
    Help,
    /// Show the dashboard.
    Dashboard,
    /// Show the hierarchy.
    Status,
    /// Ask for a strategic overview.
    Strategy,
    /// Show recent conversation.
    History,
    /// Clear memory.
    Clear,
    /// A message for the director.
    Message(String),
}

impl ReplCommand {
    /// Parses a line; command words are matched case-insensitively.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_lowercase().as_str() {
            "" => Self::Empty,
            "quit" | "exit" | "q" => Self::Quit,
            "help" | "?" => Self::Help,
            "dashboard" => Self::Dashboard,
            "status" => Self::Status,
            "strategy" => Self::Strategy,
            "history" => Self::History,
            "clear" => Self::Clear,
            _ => Self::Message(trimmed.to_string()),
        }
    }
}

/// Runs the session until `quit` or end of input.
///
/// # Errors
///
/// Returns an error if reading input or writing output fails.
pub fn run<R: BufRead, W: Write>(
    director: &mut Director,
    mut input: R,
    output: &mut W,
    format: OutputFormat,
) -> Result<()> {
    let interactive = format == OutputFormat::Text;
    if interactive {
        writeln!(output, "{BANNER}")?;
    }

    loop {
        if interactive {
            write!(output, "\n> ")?;
            output.flush()?;
        }
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        let rendered = match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => break,
            ReplCommand::Help => HELP.to_string(),
            ReplCommand::Dashboard => format_dashboard(&director.dashboard(), format),
            ReplCommand::Status => format_hierarchy(&director.status(), format),
            ReplCommand::Strategy => {
                let (reply, metadata) = director.strategy();
                format_chat(&reply, &metadata, format)
            }
            ReplCommand::History => format!("{}\n", director.conversation_summary()),
            ReplCommand::Clear => {
                director.clear_memory();
                "Conversation memory cleared.\n".to_string()
            }
            ReplCommand::Message(text) => {
                let (reply, metadata) = director.chat(&text);
                format_chat(&reply, &metadata, format)
            }
        };
        write!(output, "{rendered}")?;
        if !interactive {
            writeln!(output)?;
        }
    }

    if interactive {
        writeln!(output, "Goodbye.")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::build_director;
    use crate::agents::testing::{fixture, seeded_store};
    use crate::completion::ScriptedCompletion;
    use crate::config::Settings;
    use std::io::Cursor;
    use test_case::test_case;

    #[test_case("quit", ReplCommand::Quit ; "quit")]
    #[test_case("  EXIT ", ReplCommand::Quit ; "exit uppercase")]
    #[test_case("", ReplCommand::Empty ; "empty")]
    #[test_case("Dashboard", ReplCommand::Dashboard ; "dashboard")]
    #[test_case("status", ReplCommand::Status ; "status")]
    #[test_case("clear", ReplCommand::Clear ; "clear")]
    #[test_case("what is the status of my budget", ReplCommand::Message("what is the status of my budget".to_string()) ; "message")]
    fn test_parse(line: &str, expected: ReplCommand) {
        assert_eq!(ReplCommand::parse(line), expected);
    }

    #[test]
    fn test_session() {
        let store = seeded_store();
        let (services, scripted) = fixture(&store, ScriptedCompletion::new().with_default("Sure."));
        let mut director = build_director(services, &Settings::default());

        let input = Cursor::new("Suggest a recipe\nhistory\nclear\nhistory\nquit\nnever sent\n");
        let mut output = Vec::new();
        run(&mut director, input, &mut output, OutputFormat::Text).unwrap();
        let text = String::from_utf8(output).unwrap();

        assert!(text.contains("[Routed to Health → Nutrition]\nSure."));
        assert!(text.contains("User: Suggest a recipe"));
        assert!(text.contains("Conversation memory cleared."));
        assert!(text.contains("No recent conversations."));
        assert!(text.ends_with("Goodbye.\n"));
        assert_eq!(scripted.calls(), 1);
    }

    #[test]
    fn test_json_session_has_no_prompts() {
        let store = seeded_store();
        let (services, _) = fixture(&store, ScriptedCompletion::new().with_default("Sure."));
        let mut director = build_director(services, &Settings::default());

        let mut output = Vec::new();
        run(&mut director, Cursor::new("hello there\n"), &mut output, OutputFormat::Json).unwrap();
        let text = String::from_utf8(output).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(parsed["reply"], "Sure.");
        assert_eq!(parsed["metadata"]["coordination_type"], "direct");
    }
}
