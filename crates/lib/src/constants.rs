//! Constants used throughout the jobvault library.
//!
//! Central definitions for storage keys, cookie names and defaults shared by
//! the server and client sides.

use std::time::Duration;

/// Name of the cookie carrying the opaque session id.
pub const SESSION_COOKIE: &str = "jobvault_session";

/// Device storage key of the Local Replica's active partition.
pub const LOCAL_ACTIVE_KEY: &str = "applications";

/// Device storage key of the Local Replica's archive partition.
pub const LOCAL_ARCHIVE_KEY: &str = "archive";

/// Default session lifetime (7 days).
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default refresh threshold (6 days): a session with less than this left
/// before expiry is extended on use.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(6 * 24 * 60 * 60);

/// Default bound on a single identity verification, key-set fetch included.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default audience expected in identity assertions.
pub const DEFAULT_AUDIENCE: &str = "jobvault";

/// Minimum time between key-set fetches triggered by unknown key ids.
pub const KEY_SET_REFETCH_INTERVAL: Duration = Duration::from_secs(60);
