/// Default configuration constants used across the system.

/// Config file name searched next to the binary and in the data directory.
pub const CONFIG_FILE_NAME: &str = "notify-config.json";

/// Directory name under the per-user data directory.
pub const APP_DIR_NAME: &str = "notify";

/// Name of the fallback profile.
pub const DEFAULT_PROFILE: &str = "default";

/// Default playback volume (0-100).
pub const DEFAULT_VOLUME: u8 = 100;

/// Idle seconds after which the user counts as away from the keyboard.
pub const DEFAULT_AFK_THRESHOLD_SECS: u64 = 300;

/// Default per-action cooldown when cooldown is enabled.
pub const DEFAULT_COOLDOWN_SECS: u64 = 30;

/// Minimum command duration before the shell hook notifies.
pub const DEFAULT_SHELL_HOOK_THRESHOLD_SECS: u64 = 30;

/// Default dashboard port (always bound to loopback).
pub const DEFAULT_DASHBOARD_PORT: u16 = 8765;

/// Timeout shared by every HTTP-based channel.
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// Plugin timeout when the step leaves it unspecified.
pub const DEFAULT_PLUGIN_TIMEOUT_SECS: u64 = 10;

/// Cooldown records older than this are pruned on every write.
pub const COOLDOWN_RETENTION_SECS: i64 = 24 * 60 * 60;

/// Gap between consecutive entries still counted as active time.
pub const ACTIVE_GAP_SECS: i64 = 5 * 60;

/// Dashboard SSE poll interval.
pub const EVENTS_POLL_MS: u64 = 2000;

/// Telegram Bot API base URL.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// OpenAI speech endpoint base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com";

/// Voice used for OpenAI speech when `tts_voice` is empty.
pub const OPENAI_DEFAULT_VOICE: &str = "alloy";

/// Output sample rate for every rendered sound.
pub const OUTPUT_SAMPLE_RATE: u32 = 44_100;

/// MQTT defaults.
pub const MQTT_DEFAULT_PORT: u16 = 1883;
pub const MQTT_KEEP_ALIVE_SECS: u16 = 30;
