//! Line commands read by the `waypoint` binary.

use crate::config::ShellConfig;
use crate::shell::ShellEvent;
use url::Url;
use waypoint_core::VisitAction;
use waypoint_core::settings::ButtonSide;

pub const HELP: &str = "\
commands:
  visit <url|/path> [advance|replace|restore]
  tab <n>
  button <left|right> <n>
  back
  dismiss
  refresh
  state
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Event(ShellEvent),
    /// Print the shell state.
    State,
    Help,
    Empty,
    Invalid(String),
}

pub struct CommandParser;

impl CommandParser {
    /// Parse one line. Paths starting with `/` are resolved against the
    /// configured base URL.
    pub fn parse(input: &str, config: &ShellConfig) -> Command {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some(cmd) = parts.first() else {
            return Command::Empty;
        };

        match (*cmd, &parts[1..]) {
            ("visit" | "v", [target, rest @ ..]) => {
                let action = rest
                    .first()
                    .map(|a| VisitAction::parse(a))
                    .unwrap_or_default();
                match Self::resolve(target, config) {
                    Ok(url) => Command::Event(ShellEvent::visit(url, action)),
                    Err(reason) => Command::Invalid(reason),
                }
            }
            ("tab", [index]) => match index.parse() {
                Ok(index) => Command::Event(ShellEvent::SelectTab(index)),
                Err(_) => Command::Invalid(format!("not a tab index: {}", index)),
            },
            ("button", [side, index]) => {
                let side = match *side {
                    "left" => ButtonSide::Left,
                    "right" => ButtonSide::Right,
                    other => return Command::Invalid(format!("unknown side: {}", other)),
                };
                match index.parse() {
                    Ok(index) => Command::Event(ShellEvent::TapButton { side, index }),
                    Err(_) => Command::Invalid(format!("not a button index: {}", index)),
                }
            }
            ("back", []) => Command::Event(ShellEvent::Back),
            ("dismiss", []) => Command::Event(ShellEvent::DismissModal),
            ("refresh", []) => Command::Event(ShellEvent::RefreshConfiguration),
            ("quit" | "exit", []) => Command::Event(ShellEvent::Shutdown),
            ("state", []) => Command::State,
            ("help" | "?", _) => Command::Help,
            _ => Command::Invalid(format!("unrecognised command: {}", input.trim())),
        }
    }

    fn resolve(target: &str, config: &ShellConfig) -> Result<Url, String> {
        if target.starts_with('/') {
            config.url_for(target).map_err(|e| e.to_string())
        } else {
            Url::parse(target).map_err(|e| format!("invalid URL `{}`: {}", target, e))
        }
    }
}
