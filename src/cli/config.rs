//! Config command implementation
//!
//! Utilities for validating and inspecting configuration.

use std::path::Path;

use clap::{Parser, Subcommand};

use super::open_audio;
use crate::settings::Settings;

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the settings file and the saved sound
    Validate,
    /// Dump configuration to stdout
    Dump {
        /// Output format: json or toml
        #[arg(short, long, default_value = "json")]
        format: String,
    },
    /// Show configuration file paths
    Path,
}

/// Run the config command
pub async fn run(args: ConfigArgs, system_audio: bool) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Validate => validate_config(system_audio).await,
        ConfigCommand::Dump { format } => dump_config(&format).await,
        ConfigCommand::Path => show_paths().await,
    }
}

/// What reading the settings file turned up
#[derive(Debug, Default)]
struct Report {
    settings: Settings,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Read and check a settings file without touching audio
fn check_settings_file(path: Option<&Path>) -> Report {
    let mut report = Report::default();

    print!("Checking settings.json... ");
    match path {
        Some(path) if path.exists() => match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Settings>(&content) {
                Ok(settings) => {
                    println!("OK");
                    report.settings = settings;
                }
                Err(e) => {
                    println!("INVALID");
                    report.errors.push(format!("settings.json: {}", e));
                }
            },
            Err(e) => {
                println!("ERROR");
                report
                    .errors
                    .push(format!("settings.json: Could not read file: {}", e));
            }
        },
        Some(_) => {
            println!("NOT FOUND (using defaults)");
            report
                .warnings
                .push("settings.json: File does not exist, using defaults".to_string());
        }
        None => {
            println!("ERROR");
            report
                .errors
                .push("settings.json: Could not determine config path".to_string());
        }
    }

    for problem in report.settings.validate() {
        report.errors.push(format!("settings.json: {}", problem));
    }
    report
}

/// Validate configuration files
async fn validate_config(system_audio: bool) -> anyhow::Result<()> {
    let path = Settings::settings_path();
    let mut report = check_settings_file(path.as_deref());

    print!("Checking audio output... ");
    match open_audio(&report.settings, system_audio) {
        Ok(session) => {
            let backend = session.backend();
            println!("OK ({})", backend.name());

            if let Some(sound) = report.settings.active_custom_sound() {
                print!("Checking custom sound... ");
                match backend.probe(sound) {
                    Ok(()) => println!("OK"),
                    Err(e) => {
                        println!("UNAVAILABLE");
                        report
                            .warnings
                            .push(format!("{} (the default sound will be used)", e));
                    }
                }
            }
        }
        Err(e) => {
            println!("ERROR");
            report.errors.push(format!("audio: {:#}", e));
        }
    }

    // Print summary
    println!();
    if report.errors.is_empty() && report.warnings.is_empty() {
        println!("Configuration is valid.");
    } else {
        if !report.warnings.is_empty() {
            println!("Warnings:");
            for w in &report.warnings {
                println!("  - {}", w);
            }
        }
        if !report.errors.is_empty() {
            println!("Errors:");
            for e in &report.errors {
                println!("  - {}", e);
            }
            anyhow::bail!(
                "Configuration validation failed with {} error(s).",
                report.errors.len()
            );
        }
    }

    Ok(())
}

fn render(settings: &Settings, format: &str) -> anyhow::Result<String> {
    match format.to_lowercase().as_str() {
        "json" => Ok(serde_json::to_string_pretty(settings)?),
        "toml" => Ok(toml::to_string_pretty(settings)?),
        _ => anyhow::bail!("Unknown format '{}'. Supported formats: json, toml", format),
    }
}

/// Dump configuration to stdout
async fn dump_config(format: &str) -> anyhow::Result<()> {
    let settings = Settings::load();
    println!("{}", render(&settings, format)?);
    Ok(())
}

/// Show configuration file paths
async fn show_paths() -> anyhow::Result<()> {
    println!("Configuration paths:");

    if let Some(path) = Settings::settings_path() {
        let exists = if path.exists() { "" } else { " (not found)" };
        println!("  Settings: {}{}", path.display(), exists);
    } else {
        println!("  Settings: (could not determine path)");
    }

    // Show config directory
    if let Some(config_dir) = dirs::config_dir() {
        println!();
        println!("Config directory: {}", config_dir.join("Chimer").display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_file_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let report = check_settings_file(Some(&dir.path().join("settings.json")));
        assert!(report.errors.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.settings, Settings::default());
    }

    #[test]
    fn test_valid_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"interval_minutes": 5, "volume": 30}"#).unwrap();

        let report = check_settings_file(Some(&path));
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
        assert_eq!(report.settings.interval_minutes, 5.0);
        assert_eq!(report.settings.volume, 30);
    }

    #[test]
    fn test_bad_values_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(check_settings_file(Some(&path)).errors.len(), 1);

        std::fs::write(&path, r#"{"interval_minutes": -2, "volume": 101}"#).unwrap();
        assert_eq!(check_settings_file(Some(&path)).errors.len(), 2);

        assert_eq!(check_settings_file(None).errors.len(), 1);
    }

    #[test]
    fn test_render_formats() {
        let settings = Settings {
            custom_sound: Some(PathBuf::from("/sounds/gong.ogg")),
            use_custom_sound: true,
            ..Default::default()
        };

        let json = render(&settings, "json").unwrap();
        assert!(json.contains("\"custom_sound\": \"/sounds/gong.ogg\""));

        let toml = render(&settings, "TOML").unwrap();
        assert!(toml.contains("interval_minutes = 20.0"));
        assert!(toml.contains("use_custom_sound = true"));

        assert!(render(&settings, "yaml").is_err());
    }
}
