use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "spoiler-guard", version, about = "Blur or hide spoiler-prone video listings")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Filter a page snapshot once and print the resulting visual state.
    Run {
        #[arg(long)]
        page: PathBuf,
    },
    /// Keep a page filtered while settings change and the host reports
    /// events as JSON lines on stdin.
    Watch {
        #[arg(long)]
        page: PathBuf,
    },
    /// Inspect or change the stored filter settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    Show,
    /// VALUE is parsed as JSON, falling back to a plain string.
    Set { key: String, value: String },
    /// Forget the stored value for KEY so its default applies again.
    Reset { key: String },
    AddKeyword { keyword: String },
    RemoveKeyword { keyword: String },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_settings_set() {
        let cli = Cli::parse_from(["spoiler-guard", "settings", "set", "blurAmount", "12"]);
        match cli.command {
            Command::Settings {
                action: SettingsAction::Set { key, value },
            } => {
                assert_eq!(key, "blurAmount");
                assert_eq!(value, "12");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_settings_reset() {
        let cli = Cli::parse_from(["spoiler-guard", "settings", "reset", "hideShorts"]);
        assert!(matches!(
            cli.command,
            Command::Settings {
                action: SettingsAction::Reset { ref key }
            } if key == "hideShorts"
        ));
    }

    #[test]
    fn parses_add_keyword() {
        let cli = Cli::parse_from(["spoiler-guard", "settings", "add-keyword", "結末"]);
        assert!(matches!(
            cli.command,
            Command::Settings {
                action: SettingsAction::AddKeyword { .. }
            }
        ));
    }
}
