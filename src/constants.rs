/// Minimum percentage-point move in a fund holding worth reporting.
pub const DEFAULT_CHANGE_THRESHOLD: f64 = 0.5;

/// Holdings below this percentage are dropped from snapshots entirely.
pub const DEFAULT_MIN_HOLDING: f64 = 0.5;

/// Courtesy delay between entity fetches, in seconds.
pub const DEFAULT_FETCH_DELAY_SECS: u64 = 2;

pub const HTTP_TIMEOUT_SECS: u64 = 30;
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 60;
pub const BROWSER_NAV_TIMEOUT_SECS: u64 = 45;

/// Disclosure emails older than this are ignored.
pub const MAILBOX_LOOKBACK_DAYS: u32 = 60;
pub const MAILBOX_MAX_MESSAGES: usize = 10;

/// Single holdings above this are almost always sheet metadata, not stocks.
pub const MAX_SINGLE_HOLDING_PCT: f64 = 25.0;

/// How many disclosure months back to accept when picking files off a
/// listing page (current month first, then previous ones).
pub const DISCLOSURE_MONTHS_BACK: u32 = 3;

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";
pub const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const GROQ_MODEL: &str = "llama-3.1-70b-instruct";
