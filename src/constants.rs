use std::time::Duration;

/// Version of the `flagsync` package.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const USER_AGENT_HEADER: &str = "X-Flagsync-UserAgent";
pub const USER_AGENT: &str = concat!("Flagsync-Rust/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
pub const EVENT_QUEUE_CAPACITY: usize = 64;
