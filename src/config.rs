use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::report::{DEFAULT_CONTEXT_LOGS, DEFAULT_HEATMAP_DAYS};
use crate::storage::StoreConfig;

const APP_DIR: &str = "focus_ledger";
const STATE_FILE: &str = "state.ledger";
const CONFIG_FILE: &str = "config.toml";

pub const STATE_ENV: &str = "FOCUS_LEDGER_STATE";
pub const CONFIG_ENV: &str = "FOCUS_LEDGER_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config {}: {source}", .path.display())]
	Read {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error("failed to parse config {}: {source}", .path.display())]
	Parse {
		path: PathBuf,
		source: toml::de::Error,
	},
}

/// Settings resolved once at startup and handed down explicitly; nothing below
/// the CLI looks at the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
	pub state_path: PathBuf,
	pub heatmap_days: usize,
	pub context_log_limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
	pub state_path: Option<PathBuf>,
	pub heatmap_days: Option<usize>,
	pub context_log_limit: Option<usize>,
}

impl AppConfig {
	/// Precedence for the state file: `--state`, then `FOCUS_LEDGER_STATE`, then
	/// `state_path` in the config file, then the per-user state directory.
	pub fn resolve(cli_state: Option<PathBuf>) -> Result<Self, ConfigError> {
		let file = load_config_file(&config_path())?;
		let env_state = env::var_os(STATE_ENV)
			.map(PathBuf::from)
			.filter(|path| !path.as_os_str().is_empty());
		Ok(Self::from_sources(cli_state, env_state, file, default_state_path()))
	}

	pub fn from_sources(
		cli_state: Option<PathBuf>,
		env_state: Option<PathBuf>,
		file: ConfigFile,
		default_state: PathBuf,
	) -> Self {
		let state_path = cli_state
			.or(env_state)
			.map(absolutize)
			.or(file.state_path)
			.unwrap_or(default_state);

		Self {
			state_path,
			heatmap_days: file
				.heatmap_days
				.filter(|days| *days > 0)
				.unwrap_or(DEFAULT_HEATMAP_DAYS),
			context_log_limit: file.context_log_limit.unwrap_or(DEFAULT_CONTEXT_LOGS),
		}
	}

	pub fn store_config(&self) -> StoreConfig {
		StoreConfig {
			path: self.state_path.clone(),
		}
	}
}

/// A missing file is an empty config. A relative `state_path` is taken relative
/// to the config file's directory.
pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
	let raw = match fs::read_to_string(path) {
		Ok(raw) => raw,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ConfigFile::default()),
		Err(source) => {
			return Err(ConfigError::Read {
				path: path.to_path_buf(),
				source,
			});
		}
	};

	let mut file: ConfigFile = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
		path: path.to_path_buf(),
		source,
	})?;

	if let (Some(state_path), Some(dir)) = (&file.state_path, path.parent()) {
		if state_path.is_relative() {
			file.state_path = Some(dir.join(state_path));
		}
	}

	debug!(path = %path.display(), "config loaded");
	Ok(file)
}

fn config_path() -> PathBuf {
	if let Some(path) = env::var_os(CONFIG_ENV) {
		return PathBuf::from(path);
	}

	if let Some(path) = env::var_os("XDG_CONFIG_HOME") {
		return PathBuf::from(path).join(APP_DIR).join(CONFIG_FILE);
	}

	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("APPDATA") {
			return PathBuf::from(path).join(APP_DIR).join(CONFIG_FILE);
		}
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path)
			.join(".config")
			.join(APP_DIR)
			.join(CONFIG_FILE);
	}

	PathBuf::from(".focus_ledger").join(CONFIG_FILE)
}

fn default_state_path() -> PathBuf {
	state_dir().join(STATE_FILE)
}

fn state_dir() -> PathBuf {
	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join(APP_DIR);
		}
	}

	if let Some(path) = env::var_os("XDG_STATE_HOME") {
		return PathBuf::from(path).join(APP_DIR);
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path)
			.join(".local")
			.join("state")
			.join(APP_DIR);
	}

	PathBuf::from(".focus_ledger")
}

fn absolutize(path: PathBuf) -> PathBuf {
	if path.is_absolute() {
		path
	} else if let Ok(cwd) = env::current_dir() {
		cwd.join(path)
	} else {
		path
	}
}

#[cfg(test)]
mod tests {
	use std::fs;
	use std::path::PathBuf;

	use tempfile::TempDir;

	use crate::report::{DEFAULT_CONTEXT_LOGS, DEFAULT_HEATMAP_DAYS};

	use super::{AppConfig, ConfigError, ConfigFile, load_config_file};

	#[test]
	fn cli_path_wins_over_env_and_file() {
		let file = ConfigFile {
			state_path: Some(PathBuf::from("/from/file.ledger")),
			..ConfigFile::default()
		};
		let config = AppConfig::from_sources(
			Some(PathBuf::from("/from/cli.ledger")),
			Some(PathBuf::from("/from/env.ledger")),
			file.clone(),
			PathBuf::from("/default.ledger"),
		);
		assert_eq!(config.state_path, PathBuf::from("/from/cli.ledger"));

		let config = AppConfig::from_sources(
			None,
			Some(PathBuf::from("/from/env.ledger")),
			file.clone(),
			PathBuf::from("/default.ledger"),
		);
		assert_eq!(config.state_path, PathBuf::from("/from/env.ledger"));

		let config = AppConfig::from_sources(None, None, file, PathBuf::from("/default.ledger"));
		assert_eq!(config.state_path, PathBuf::from("/from/file.ledger"));
	}

	#[test]
	fn falls_back_to_defaults() {
		let config = AppConfig::from_sources(
			None,
			None,
			ConfigFile {
				heatmap_days: Some(0),
				..ConfigFile::default()
			},
			PathBuf::from("/default.ledger"),
		);
		assert_eq!(config.state_path, PathBuf::from("/default.ledger"));
		assert_eq!(config.heatmap_days, DEFAULT_HEATMAP_DAYS);
		assert_eq!(config.context_log_limit, DEFAULT_CONTEXT_LOGS);
		assert_eq!(config.store_config().path, config.state_path);
	}

	#[test]
	fn reads_config_file_relative_to_its_directory() {
		let dir = TempDir::new().expect("temp dir");
		let path = dir.path().join("config.toml");
		fs::write(
			&path,
			"state_path = \"data/state.ledger\"\nheatmap_days = 30\ncontext_log_limit = 5\n",
		)
		.expect("write config");

		let file = load_config_file(&path).expect("config should parse");
		assert_eq!(file.state_path, Some(dir.path().join("data/state.ledger")));
		assert_eq!(file.heatmap_days, Some(30));
		assert_eq!(file.context_log_limit, Some(5));

		let missing = load_config_file(&dir.path().join("absent.toml")).expect("missing is fine");
		assert_eq!(missing, ConfigFile::default());
	}

	#[test]
	fn rejects_malformed_config() {
		let dir = TempDir::new().expect("temp dir");
		let path = dir.path().join("config.toml");
		fs::write(&path, "heatmap_days = \"many\"\n").expect("write config");

		let err = load_config_file(&path).expect_err("wrong type");
		assert!(matches!(err, ConfigError::Parse { .. }));
	}
}
