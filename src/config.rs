//! Session configuration and the compiled-in animation constants.

use serde::Deserialize;

use crate::error::{RaceError, Result};

// --- Animation timing ----------------------------------------------------------

pub const DRIVE_DURATION_MS: u32 = 500;
pub const DRIVE_FPS: u32 = 30;
pub const BURN_PERIOD_MS: u32 = 100;
pub const FLAG_FPS: u32 = 30;
pub const FLAG_FRAMES: u32 = 50;

/// Frames in one driving transition: floor(duration * fps) + 1.
pub const fn drive_frame_count() -> u32 {
    DRIVE_DURATION_MS * DRIVE_FPS / 1000 + 1
}

// --- DOM element ids -----------------------------------------------------------

pub const CANVAS_ID: &str = "canvas";
pub const DRUGSTORE_ID: &str = "drugstore";
pub const GAME_OVER_ID: &str = "game-over";
pub const GAME_OVER_TEXT_ID: &str = "game-over-text";
pub const NOTICE_ID: &str = "race-notice";
pub const FORM_RED_ID: &str = "form-red";
pub const FORM_BLUE_ID: &str = "form-blue";

pub const DEFAULT_NUM_STAGES: u32 = 40;

/// Per-session settings handed over by the hosting page.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RaceConfig {
    /// Driver license (session code) issued by the server.
    pub license: String,
    #[serde(default = "default_num_stages")]
    pub num_stages: u32,
    #[serde(default = "default_asset_root")]
    pub asset_root: String,
    #[serde(default = "default_choose_path")]
    pub choose_path: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u32,
    #[serde(default = "default_request_retries")]
    pub request_retries: u32,
    #[serde(default = "default_asset_timeout_ms")]
    pub asset_timeout_ms: u32,
}

fn default_num_stages() -> u32 {
    DEFAULT_NUM_STAGES
}
fn default_asset_root() -> String {
    "/static".to_string()
}
fn default_choose_path() -> String {
    "/choose".to_string()
}
fn default_request_timeout_ms() -> u32 {
    8_000
}
fn default_request_retries() -> u32 {
    2
}
fn default_asset_timeout_ms() -> u32 {
    10_000
}

impl RaceConfig {
    pub fn new(license: impl Into<String>, num_stages: u32) -> Result<Self> {
        let config = Self {
            license: license.into(),
            num_stages,
            asset_root: default_asset_root(),
            choose_path: default_choose_path(),
            request_timeout_ms: default_request_timeout_ms(),
            request_retries: default_request_retries(),
            asset_timeout_ms: default_asset_timeout_ms(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON options object; only `license` is mandatory.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.license.trim().is_empty() {
            return Err(RaceError::Config("license must not be empty".into()));
        }
        if self.num_stages == 0 {
            return Err(RaceError::Config("numStages must be at least 1".into()));
        }
        if self.choose_path.is_empty()
            || self
                .choose_path
                .contains(|c: char| c == '?' || c == '#' || c.is_whitespace())
        {
            return Err(RaceError::Config(
                "choosePath must be a bare path without query or fragment".into(),
            ));
        }
        if self.request_timeout_ms == 0 || self.asset_timeout_ms == 0 {
            return Err(RaceError::Config("timeouts must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_frame_count_matches_duration_and_fps() {
        assert_eq!(drive_frame_count(), 16);
    }

    #[test]
    fn json_fills_defaults() {
        let cfg = RaceConfig::from_json(r#"{"license":"MFRGG==="}"#).unwrap();
        assert_eq!(cfg, RaceConfig::new("MFRGG===", 40).unwrap());
        assert_eq!(cfg.asset_root, "/static");
        assert_eq!(cfg.choose_path, "/choose");
    }

    #[test]
    fn json_overrides() {
        let cfg = RaceConfig::from_json(
            r#"{"license":"X","numStages":8,"requestRetries":0,"assetRoot":"/cdn"}"#,
        )
        .unwrap();
        assert_eq!(cfg.num_stages, 8);
        assert_eq!(cfg.request_retries, 0);
        assert_eq!(cfg.asset_root, "/cdn");
    }

    #[test]
    fn rejects_zero_stages_and_missing_license() {
        assert!(matches!(RaceConfig::new("X", 0), Err(RaceError::Config(_))));
        assert!(matches!(RaceConfig::new("  ", 40), Err(RaceError::Config(_))));
        assert!(matches!(
            RaceConfig::from_json(r#"{"numStages":4}"#),
            Err(RaceError::Decode(_))
        ));
    }

    #[test]
    fn rejects_choose_path_with_query() {
        for path in ["/choose?x=1", "/choose#top", "/cho ose", ""] {
            let raw = format!(r#"{{"license":"X","choosePath":"{path}"}}"#);
            assert!(
                matches!(RaceConfig::from_json(&raw), Err(RaceError::Config(_))),
                "{path}"
            );
        }
        assert!(RaceConfig::from_json(r#"{"license":"X","choosePath":"https://race.example/choose"}"#).is_ok());
    }
}
