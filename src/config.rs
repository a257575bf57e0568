//! Persisted CLI settings (spec.md §6's port/bitrate/catalogue collaborator
//! wiring, made concrete). Modeled on `blri::settings::BlriConfig`'s
//! load/save/display shape, trimmed to the fields this tool actually needs
//! — no target/package/release, there's no firmware build step here.

use std::fs;
use std::path::PathBuf;

use colored::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolConfig {
    pub port: Option<String>,
    pub bitrate: u32,
    pub chip_catalogue_path: Option<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig {
            port: None,
            bitrate: 19200,
            chip_catalogue_path: None,
        }
    }
}

impl ToolConfig {
    pub fn settings_path() -> Option<PathBuf> {
        std::env::current_dir()
            .ok()
            .map(|dir| dir.join("target").join("ppm-prog.toml"))
    }

    pub fn load() -> Self {
        if let Some(path) = Self::settings_path() {
            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(config) = toml::from_str::<ToolConfig>(&content) {
                    println!(
                        "{} {}",
                        "loaded configuration:".bright_blue().bold(),
                        path.display()
                    );
                    return config;
                }
            }
        }
        println!("{}", "no configuration found, using defaults".bright_yellow());
        ToolConfig::default()
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let path = Self::settings_path().ok_or("cannot determine current directory")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        println!(
            "{} {}",
            "configuration saved to:".bright_green().bold(),
            path.display()
        );
        Ok(())
    }

    pub fn display(&self) {
        println!(
            "  {}: {}",
            "port".bright_cyan(),
            self.port.as_deref().unwrap_or("auto-detect").bright_white()
        );
        println!("  {}: {}", "bitrate".bright_cyan(), self.bitrate);
        println!(
            "  {}: {}",
            "chip catalogue".bright_cyan(),
            self.chip_catalogue_path.as_deref().unwrap_or("built-in").bright_white()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bitrate_matches_documented_fallback() {
        assert_eq!(ToolConfig::default().bitrate, 19200);
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = ToolConfig {
            port: Some("/dev/ttyUSB0".into()),
            bitrate: 38400,
            chip_catalogue_path: Some("chips.toml".into()),
        };
        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: ToolConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.port, cfg.port);
        assert_eq!(back.bitrate, cfg.bitrate);
        assert_eq!(back.chip_catalogue_path, cfg.chip_catalogue_path);
    }
}
