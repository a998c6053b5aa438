/// Largest encoded message accepted on the peer channel, in bytes.
///
/// `STATE_UPDATE` blobs are the only payloads that grow; everything else is
/// a few hundred bytes at most.
pub const MAX_MESSAGE_LEN: usize = 2 * 1024 * 1024;

/// Stream framing prefix length in bytes.
///
/// Stream transports frame each message as `[u32 len_le][json bytes]`.
pub const FRAME_LEN_PREFIX: usize = 4;

/// Maximum size of a single frame (prefix excluded).
pub const MAX_FRAME_LEN: usize = MAX_MESSAGE_LEN;
