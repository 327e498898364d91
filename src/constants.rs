//! This module contains global constants used across the server, client, and sync loop.

/// OAuth 2.0 authorization code flow login route.
pub const OAUTH_LOGIN_ROUTE: &str = "/login";
/// OAuth 2.0 authorization code flow callback route.
pub const OAUTH_CALLBACK_ROUTE: &str = "/login/callback";

/// OAuth 2.0 scopes requested for this app.
pub const OAUTH_SCOPES: [&str; 3] = [
    "user-read-email",
    // /me/player/currently-playing
    "user-read-currently-playing",
    // /me/player and /me/player/queue
    "user-read-playback-state",
];

/// Upstream endpoints.
pub const SPOTIFY_AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

pub const DEFAULT_HOSTNAME: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_GPIO_SLOWDOWN: u32 = 3;
pub const DEFAULT_HARDWARE_MAPPING: &str = "adafruit-hat-pwm";
pub const DEFAULT_LIMIT_REFRESH_HZ: u32 = 60;

/// Poll interval of the sync loop.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
/// How long playback may stay paused before the display is blanked.
pub const DEFAULT_INACTIVITY_MS: u64 = 5000;
/// Upper bound for the playback half of a single tick.
pub const DEFAULT_TICK_TIMEOUT_MS: u64 = 10_000;
/// Largest accepted value for any of the sync durations (one day).
pub const MAX_SYNC_MS: u64 = 86_400_000;
/// Largest accepted matrix width or height, in pixels.
pub const MAX_MATRIX_DIMENSION: u32 = 1024;
/// Used when a 429 arrives without a usable Retry-After header.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Self-signed certificate lifetime.
pub const CERTIFICATE_VALIDITY_DAYS: i64 = 365;
/// Grace period for the HTTPS listener during shutdown.
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Display brightness bounds, in percent.
pub const BRIGHTNESS_MIN: u8 = 0;
pub const BRIGHTNESS_MAX: u8 = 100;

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));
