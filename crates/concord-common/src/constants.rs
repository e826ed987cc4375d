//! System-wide constants for Concord.

/// Separator between peers in the canonical configuration string.
pub const PEER_SEPARATOR: char = ',';

/// Separator between fields of a canonical peer string.
pub const PEER_FIELD_SEPARATOR: char = ':';

/// Scheme prefix for unix domain socket endpoints.
pub const UNIX_SCHEME: &str = "unix";

/// Format version of encoded configuration entries.
pub const CONFIGURATION_ENTRY_VERSION: u8 = 1;

/// Longest accepted unix socket path, the size of `sun_path` on Linux.
pub const UNIX_PATH_MAX_LEN: usize = 108;

/// Upper bound on a single encoded peer string.
///
/// Unix socket paths are the longest legal endpoints (see
/// [`UNIX_PATH_MAX_LEN`]); the rest of the peer string adds at most a few
/// dozen bytes.
pub const PEER_STRING_MAX_LEN: usize = 256;

/// Upper bound on the number of peers in one configuration.
pub const CONFIGURATION_PEERS_MAX: usize = 1024;
