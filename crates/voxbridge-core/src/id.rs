//! Identifier types for the voice protocol
//!
//! Channels are addressed by 64-bit ids, connected clients by the 16-bit
//! session-local id the server hands out.

use std::fmt;

/// Channel identity on the voice server
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ChannelId(pub u64);

impl ChannelId {
    pub const ZERO: ChannelId = ChannelId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        ChannelId(id)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel({})", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChannelId {
    fn from(id: u64) -> Self {
        ChannelId(id)
    }
}

/// Connected client identity - only valid for the lifetime of a connection
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ClientId(pub u16);

impl ClientId {
    #[inline]
    pub fn new(id: u16) -> Self {
        ClientId(id)
    }

    #[inline]
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Client({})", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for ClientId {
    fn from(id: u16) -> Self {
        ClientId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_ordering() {
        let mut ids = vec![ChannelId(7), ChannelId(1), ChannelId(3)];
        ids.sort();
        assert_eq!(ids, vec![ChannelId(1), ChannelId(3), ChannelId(7)]);
    }

    #[test]
    fn test_id_formatting() {
        assert_eq!(format!("{:?}", ChannelId(42)), "Channel(42)");
        assert_eq!(format!("{}", ClientId(5)), "5");
    }
}
