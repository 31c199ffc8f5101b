use std::time::Duration;

/// Interval between server pings on an idle connection.
pub const PING_INTERVAL: Duration = Duration::from_secs(54);
/// A connection that sends nothing (not even a pong) for this long is dead.
pub const PONG_WAIT: Duration = Duration::from_secs(60);
