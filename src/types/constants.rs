/// Broker topic prefixes
pub mod topics {
    pub const NOTIFICATIONS: &str = "/topic/notifications";
    pub const NOTIFICATION_COUNT: &str = "/topic/notifications/count";
    pub const CAPSULE: &str = "/topic/capsule";
}

/// Client-to-server send destinations
pub mod destinations {
    pub const NOTIFICATIONS_CONNECT: &str = "/app/notifications/connect";
    pub const NOTIFICATIONS_MARK_READ: &str = "/app/notifications/mark-read";
    pub const NOTIFICATIONS_MARK_ALL_READ: &str = "/app/notifications/mark-all-read";
    pub const CAPSULE_CONNECT: &str = "/app/capsule/connect";
}

/// Default transport connect timeout (milliseconds)
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

/// Default read-idle timeout (milliseconds); a session that sees no inbound
/// frame for this long treats the transport as dead
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 30_000;

/// Default write timeout for a single outbound frame (milliseconds)
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 30_000;

/// Default delay between reconnect attempts (milliseconds, fixed schedule)
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;

/// Default cap on consecutive reconnect attempts
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Capacity of per-topic and per-session broadcast streams
pub const EVENT_STREAM_CAPACITY: usize = 128;

/// How many recently applied event ids each channel remembers for
/// duplicate discarding
pub const EVENT_ID_HISTORY: usize = 128;
