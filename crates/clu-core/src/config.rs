use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    errors::Error,
    platform::throttled::DEFAULT_MIN_INTERVAL,
    settings::{reconcile::DEFAULT_SETTINGS_CHANNEL, BallotMarkers},
    Result,
};

/// Typed configuration for the bot, read from the environment (and `.env`).
#[derive(Clone)]
pub struct Config {
    // Credentials
    pub discord_token: String,

    // Settings
    pub settings_schema_path: PathBuf,
    pub settings_channel: String,
    pub markers: BallotMarkers,

    // Pacing of mutating platform calls
    pub pacing_interval: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"<redacted>")
            .field("settings_schema_path", &self.settings_schema_path)
            .field("settings_channel", &self.settings_channel)
            .field("markers", &self.markers)
            .field("pacing_interval", &self.pacing_interval)
            .finish()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Token: env first, then the first line of the keychain file.
        let token_file = env_path("CLU_TOKEN_FILE").unwrap_or_else(|| PathBuf::from("keychain/Token.txt"));
        let discord_token = env_str("DISCORD_TOKEN")
            .and_then(non_empty)
            .or_else(|| read_first_line(&token_file))
            .ok_or_else(|| {
                Error::Config(format!(
                    "DISCORD_TOKEN is not set and no token was found in {}",
                    token_file.display()
                ))
            })?;

        let settings_schema_path = env_path("CLU_SETTINGS_SCHEMA")
            .unwrap_or_else(|| PathBuf::from("data/DefaultSettings.json"));
        let settings_channel = env_str("CLU_SETTINGS_CHANNEL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_SETTINGS_CHANNEL.to_string());

        let defaults = BallotMarkers::default();
        let markers = BallotMarkers::new(
            env_str("CLU_AFFIRM_MARKER")
                .and_then(non_empty)
                .unwrap_or(defaults.affirm),
            env_str("CLU_DENY_MARKER")
                .and_then(non_empty)
                .unwrap_or(defaults.deny),
        );
        if markers.affirm == markers.deny {
            return Err(Error::Config(
                "CLU_AFFIRM_MARKER and CLU_DENY_MARKER must differ".to_string(),
            ));
        }

        let pacing_interval = env_u64("CLU_PACING_MS")
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_MIN_INTERVAL);

        Ok(Self {
            discord_token,
            settings_schema_path,
            settings_channel,
            markers,
            pacing_interval,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn read_first_line(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    contents
        .lines()
        .next()
        .map(|l| l.trim().to_string())
        .and_then(non_empty)
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotenv_lines_are_parsed() {
        let parsed = parse_dotenv(
            "# comment\n\nDISCORD_TOKEN=\"abc\"\nCLU_PACING_MS = 2000\nnot a pair\n=orphan\nQUOTED='x y'\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("DISCORD_TOKEN".to_string(), "abc".to_string()),
                ("CLU_PACING_MS".to_string(), "2000".to_string()),
                ("QUOTED".to_string(), "x y".to_string()),
            ]
        );
    }

    #[test]
    fn token_file_first_line_is_trimmed() {
        let path = std::env::temp_dir().join(format!("clu-token-{}", std::process::id()));
        std::fs::write(&path, "  secret-token \nsecond line\n").unwrap();
        assert_eq!(read_first_line(&path).as_deref(), Some("secret-token"));

        std::fs::write(&path, "\n").unwrap();
        assert_eq!(read_first_line(&path), None);
        let _ = std::fs::remove_file(&path);

        assert_eq!(read_first_line(Path::new("/nonexistent/clu/token")), None);
    }

    #[test]
    fn debug_output_redacts_token() {
        let cfg = Config {
            discord_token: "very-secret".to_string(),
            settings_schema_path: PathBuf::from("data/DefaultSettings.json"),
            settings_channel: DEFAULT_SETTINGS_CHANNEL.to_string(),
            markers: BallotMarkers::default(),
            pacing_interval: DEFAULT_MIN_INTERVAL,
        };
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("very-secret"));
        assert!(dbg.contains("clu-bot-settings"));
    }
}
