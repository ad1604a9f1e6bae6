pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";

/// Name the signaling server assigns when a participant joins without one.
pub const DEFAULT_DISPLAY_NAME: &str = "Guest";
