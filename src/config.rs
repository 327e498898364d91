use clap::{ArgAction, Parser, ValueHint};
use dirs_next::{config_dir, home_dir};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use crate::constants::{
    DEFAULT_GPIO_SLOWDOWN, DEFAULT_HARDWARE_MAPPING, DEFAULT_HOSTNAME, DEFAULT_INACTIVITY_MS,
    DEFAULT_LIMIT_REFRESH_HZ, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PORT, DEFAULT_TICK_TIMEOUT_MS,
    MAX_MATRIX_DIMENSION, MAX_SYNC_MS,
};
use crate::location::Coordinates;
use crate::sync_loop::SyncSettings;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level file configuration. Every field is optional so CLI flags can be
/// layered over it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>, // e.g., "info" | "debug"
    pub server: Option<ServerConfig>,
    pub spotify: Option<SpotifyConfig>,
    pub matrix: Option<MatrixConfig>,
    pub location: Option<LocationConfig>,
    pub sync: Option<SyncConfig>,
    pub store_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    pub hostname: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MatrixConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub gpio_slowdown: Option<u32>,
    pub hardware_mapping: Option<String>,
    pub limit_refresh_hz: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub auto_locate: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    pub poll_interval_ms: Option<u64>,
    pub inactivity_ms: Option<u64>,
    pub tick_timeout_ms: Option<u64>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "spotify-ish", about = "Now-playing cover art on an LED matrix", version)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, short = 'c', value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Enable debug log level
    #[arg(long, short = 'v', alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Hostname used for the self-signed certificate and OAuth redirect URLs
    #[arg(long)]
    pub hostname: Option<String>,
    /// Port the HTTPS server listens on
    #[arg(long)]
    pub port: Option<u16>,
    /// Spotify application client ID
    #[arg(long, env = "SPOTIFY_CLIENT_ID")]
    pub client_id: Option<String>,
    /// Spotify application client secret
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,
    /// Width of the LED matrix
    #[arg(long)]
    pub width: Option<u32>,
    /// Height of the LED matrix
    #[arg(long)]
    pub height: Option<u32>,
    /// How much to slow down I/O to the matrix
    #[arg(long)]
    pub gpio_slowdown: Option<u32>,
    /// Used for auto-dimming of the matrix based on sun position
    #[arg(long, allow_negative_numbers = true)]
    pub latitude: Option<f64>,
    /// Used for auto-dimming of the matrix based on sun position
    #[arg(long, allow_negative_numbers = true)]
    pub longitude: Option<f64>,
    /// Look up coordinates by GeoIP when none are configured
    #[arg(long, action = ArgAction::SetTrue)]
    pub auto_locate: bool,
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
    #[arg(long)]
    pub inactivity_ms: Option<u64>,
    /// Path of the JSON credential store
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub store_path: Option<PathBuf>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Fully resolved settings handed to the rest of the program.
#[derive(Debug, Clone)]
pub struct Settings {
    pub log_level: String,
    pub hostname: String,
    pub port: u16,
    pub client_id: String,
    pub client_secret: String,
    pub matrix: MatrixSettings,
    pub coordinates: Option<Coordinates>,
    pub auto_locate: bool,
    pub sync: SyncSettings,
    pub store_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSettings {
    pub width: u32,
    pub height: u32,
    pub gpio_slowdown: u32,
    pub hardware_mapping: String,
    pub limit_refresh_hz: u32,
}

impl MatrixSettings {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            gpio_slowdown: DEFAULT_GPIO_SLOWDOWN,
            hardware_mapping: DEFAULT_HARDWARE_MAPPING.to_string(),
            limit_refresh_hz: DEFAULT_LIMIT_REFRESH_HZ,
        }
    }
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Settings, ConfigError> {
    let cli = Cli::parse();
    let cfg = load_with(&cli)?;

    if cli.dump_config {
        // Pretty YAML of effective config, secrets blanked
        let mut redacted = cfg.clone();
        if let Some(spotify) = redacted.spotify.as_mut() {
            if spotify.client_secret.is_some() {
                spotify.client_secret = Some("<redacted>".into());
            }
        }
        let s = serde_yaml::to_string(&redacted)?;
        println!("{s}");
        std::process::exit(0);
    }

    let mut settings = resolve(&cfg)?;
    if cli.debug {
        settings.log_level = "debug".into();
    }
    Ok(settings)
}

/// Layers defaults, the YAML file and the CLI flags into one `Config`.
pub fn load_with(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    if let Some(home) = home_dir() {
        let p = home.join(".config/spotify-ish/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/spotify-ish.yaml");
        if p.exists() { return Some(p) }
    }
    for candidate in &["spotify-ish.yaml", "config.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some()  { dst.log_level = src.log_level; }
    if src.store_path.is_some() { dst.store_path = src.store_path; }

    if let Some(s) = src.server {
        let d = dst.server.get_or_insert_with(Default::default);
        if s.hostname.is_some() { d.hostname = s.hostname; }
        if s.port.is_some()     { d.port = s.port; }
    }
    if let Some(s) = src.spotify {
        let d = dst.spotify.get_or_insert_with(Default::default);
        if s.client_id.is_some()     { d.client_id = s.client_id; }
        if s.client_secret.is_some() { d.client_secret = s.client_secret; }
    }
    if let Some(s) = src.matrix {
        merge_matrix(dst.matrix.get_or_insert_with(Default::default), s);
    }
    if let Some(s) = src.location {
        let d = dst.location.get_or_insert_with(Default::default);
        if s.latitude.is_some()    { d.latitude = s.latitude; }
        if s.longitude.is_some()   { d.longitude = s.longitude; }
        if s.auto_locate.is_some() { d.auto_locate = s.auto_locate; }
    }
    if let Some(s) = src.sync {
        let d = dst.sync.get_or_insert_with(Default::default);
        if s.poll_interval_ms.is_some() { d.poll_interval_ms = s.poll_interval_ms; }
        if s.inactivity_ms.is_some()    { d.inactivity_ms = s.inactivity_ms; }
        if s.tick_timeout_ms.is_some()  { d.tick_timeout_ms = s.tick_timeout_ms; }
    }
}

fn merge_matrix(dst: &mut MatrixConfig, src: MatrixConfig) {
    if src.width.is_some()            { dst.width = src.width; }
    if src.height.is_some()           { dst.height = src.height; }
    if src.gpio_slowdown.is_some()    { dst.gpio_slowdown = src.gpio_slowdown; }
    if src.hardware_mapping.is_some() { dst.hardware_mapping = src.hardware_mapping; }
    if src.limit_refresh_hz.is_some() { dst.limit_refresh_hz = src.limit_refresh_hz; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()  { cfg.log_level = cli.log_level.clone(); }
    if cli.store_path.is_some() { cfg.store_path = cli.store_path.clone(); }

    let overlay = Config {
        log_level: None,
        store_path: None,
        server: Some(ServerConfig {
            hostname: cli.hostname.clone(),
            port: cli.port,
        }),
        spotify: Some(SpotifyConfig {
            client_id: cli.client_id.clone(),
            client_secret: cli.client_secret.clone(),
        }),
        matrix: Some(MatrixConfig {
            width: cli.width,
            height: cli.height,
            gpio_slowdown: cli.gpio_slowdown,
            ..Default::default()
        }),
        location: Some(LocationConfig {
            latitude: cli.latitude,
            longitude: cli.longitude,
            auto_locate: cli.auto_locate.then_some(true),
        }),
        sync: Some(SyncConfig {
            poll_interval_ms: cli.poll_interval_ms,
            inactivity_ms: cli.inactivity_ms,
            tick_timeout_ms: None,
        }),
    };
    merge(cfg, overlay);
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(server) = cfg.server.as_ref() {
        if server.port == Some(0) {
            return Err(ConfigError::Validation("server port must be > 0".into()));
        }
        if server.hostname.as_deref().is_some_and(|h| h.trim().is_empty()) {
            return Err(ConfigError::Validation("server hostname must not be empty".into()));
        }
    }
    if let Some(matrix) = cfg.matrix.as_ref() {
        if matrix.width == Some(0) || matrix.height == Some(0) {
            return Err(ConfigError::Validation("matrix width/height must be > 0".into()));
        }
        let oversized = |d: Option<u32>| d.is_some_and(|d| d > MAX_MATRIX_DIMENSION);
        if oversized(matrix.width) || oversized(matrix.height) {
            return Err(ConfigError::Validation(format!(
                "matrix width/height must be <= {MAX_MATRIX_DIMENSION}"
            )));
        }
    }
    if let Some(location) = cfg.location.as_ref() {
        match (location.latitude, location.longitude) {
            (Some(lat), Some(lng)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    return Err(ConfigError::Validation(format!("latitude {lat} out of range -90..=90")));
                }
                if !(-180.0..=180.0).contains(&lng) {
                    return Err(ConfigError::Validation(format!("longitude {lng} out of range -180..=180")));
                }
            }
            (None, None) => {}
            _ => {
                return Err(ConfigError::Validation(
                    "latitude and longitude must be given together".into(),
                ))
            }
        }
    }
    if let Some(sync) = cfg.sync.as_ref() {
        if sync.poll_interval_ms == Some(0) {
            return Err(ConfigError::Validation("poll_interval_ms must be > 0".into()));
        }
        if sync.tick_timeout_ms == Some(0) {
            return Err(ConfigError::Validation("tick_timeout_ms must be > 0".into()));
        }
        for (name, value) in [
            ("poll_interval_ms", sync.poll_interval_ms),
            ("inactivity_ms", sync.inactivity_ms),
            ("tick_timeout_ms", sync.tick_timeout_ms),
        ] {
            if value.is_some_and(|ms| ms > MAX_SYNC_MS) {
                return Err(ConfigError::Validation(format!("{name} must be <= {MAX_SYNC_MS}")));
            }
        }
    }
    Ok(())
}

/// Fills in defaults and enforces the settings the daemon cannot start without.
pub fn resolve(cfg: &Config) -> Result<Settings, ConfigError> {
    let server = cfg.server.clone().unwrap_or_default();
    let spotify = cfg.spotify.clone().unwrap_or_default();
    let matrix = cfg.matrix.clone().unwrap_or_default();
    let location = cfg.location.clone().unwrap_or_default();
    let sync = cfg.sync.clone().unwrap_or_default();

    let client_id = spotify
        .client_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::Validation("spotify client_id is required".into()))?;
    let client_secret = spotify
        .client_secret
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::Validation("spotify client_secret is required".into()))?;
    let width = matrix
        .width
        .ok_or_else(|| ConfigError::Validation("matrix width is required".into()))?;
    let height = matrix
        .height
        .ok_or_else(|| ConfigError::Validation("matrix height is required".into()))?;

    let store_path = match cfg.store_path.clone() {
        Some(p) => p,
        None => config_dir()
            .map(|d| d.join("spotify-ish").join("config.json"))
            .ok_or_else(|| ConfigError::Validation("no config directory; set store_path".into()))?,
    };

    let coordinates = match (location.latitude, location.longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
        _ => None,
    };

    Ok(Settings {
        log_level: cfg.log_level.clone().unwrap_or_else(|| "info".into()),
        hostname: server.hostname.unwrap_or_else(|| DEFAULT_HOSTNAME.into()),
        port: server.port.unwrap_or(DEFAULT_PORT),
        client_id,
        client_secret,
        matrix: MatrixSettings {
            width,
            height,
            gpio_slowdown: matrix.gpio_slowdown.unwrap_or(DEFAULT_GPIO_SLOWDOWN),
            hardware_mapping: matrix
                .hardware_mapping
                .unwrap_or_else(|| DEFAULT_HARDWARE_MAPPING.into()),
            limit_refresh_hz: matrix.limit_refresh_hz.unwrap_or(DEFAULT_LIMIT_REFRESH_HZ),
        },
        coordinates,
        auto_locate: location.auto_locate.unwrap_or(false),
        sync: SyncSettings {
            poll_interval: Duration::from_millis(sync.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS)),
            inactivity_window: Duration::from_millis(sync.inactivity_ms.unwrap_or(DEFAULT_INACTIVITY_MS)),
            tick_timeout: Duration::from_millis(sync.tick_timeout_ms.unwrap_or(DEFAULT_TICK_TIMEOUT_MS)),
        },
        store_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["spotify-ish"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_cli_overrides_yaml() {
        let f = yaml_file(
            "server:\n  hostname: pi.local\n  port: 9000\nspotify:\n  client_id: abc\n  client_secret: shh\nmatrix:\n  width: 64\n  height: 64\n",
        );
        let path = f.path().to_str().unwrap().to_string();
        let c = cli(&["--config", &path, "--port", "9443", "--client-id", "xyz"]);
        let cfg = load_with(&c).unwrap();
        let settings = resolve(&cfg).unwrap();

        assert_eq!(settings.hostname, "pi.local");
        assert_eq!(settings.port, 9443);
        assert_eq!(settings.client_id, "xyz");
        assert_eq!(settings.client_secret, "shh");
        assert_eq!(settings.matrix.width, 64);
        assert_eq!(settings.matrix.gpio_slowdown, DEFAULT_GPIO_SLOWDOWN);
        assert_eq!(settings.sync.poll_interval, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
        assert!(settings.coordinates.is_none());
    }

    #[test]
    fn test_negative_coordinates_from_cli() {
        let f = yaml_file("matrix:\n  width: 32\n  height: 32\n");
        let path = f.path().to_str().unwrap().to_string();
        let c = cli(&[
            "--config", &path,
            "--client-id", "a", "--client-secret", "b",
            "--latitude", "-33.86", "--longitude", "151.2",
        ]);
        let settings = resolve(&load_with(&c).unwrap()).unwrap();
        let coords = settings.coordinates.unwrap();
        assert_eq!(coords.latitude, -33.86);
        assert_eq!(coords.longitude, 151.2);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let c = cli(&["--config", "/definitely/not/here.yaml"]);
        assert!(matches!(load_with(&c), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_half_coordinates() {
        let cfg = Config {
            location: Some(LocationConfig { latitude: Some(10.0), ..Default::default() }),
            ..Default::default()
        };
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_latitude() {
        let cfg = Config {
            location: Some(LocationConfig {
                latitude: Some(91.0),
                longitude: Some(0.0),
                auto_locate: None,
            }),
            ..Default::default()
        };
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_dimensions() {
        let cfg = Config {
            matrix: Some(MatrixConfig { width: Some(0), height: Some(64), ..Default::default() }),
            ..Default::default()
        };
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_dimensions() {
        let cfg = Config {
            matrix: Some(MatrixConfig { width: Some(64), height: Some(70_000), ..Default::default() }),
            ..Default::default()
        };
        assert!(validate(&cfg).is_err());

        let cfg = Config {
            matrix: Some(MatrixConfig {
                width: Some(MAX_MATRIX_DIMENSION),
                height: Some(MAX_MATRIX_DIMENSION),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_validate_rejects_huge_durations() {
        let cfg = Config {
            sync: Some(SyncConfig { inactivity_ms: Some(u64::MAX), ..Default::default() }),
            ..Default::default()
        };
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("inactivity_ms"));

        let cfg = Config {
            sync: Some(SyncConfig { poll_interval_ms: Some(MAX_SYNC_MS + 1), ..Default::default() }),
            ..Default::default()
        };
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_resolve_requires_credentials() {
        let cfg = Config {
            matrix: Some(MatrixConfig { width: Some(64), height: Some(64), ..Default::default() }),
            ..Default::default()
        };
        let err = resolve(&cfg).unwrap_err();
        assert!(err.to_string().contains("client_id"));
    }
}
