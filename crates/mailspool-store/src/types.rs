//! Mailbox value types.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a message in the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A named message flag.
///
/// The well-known flags are constants; any other name is allowed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flag(Cow<'static, str>);

impl Flag {
    pub const SEEN: Flag = Flag(Cow::Borrowed("seen"));
    /// Marks a message for removal by the next expunge.
    pub const DELETED: Flag = Flag(Cow::Borrowed("deleted"));
    pub const FLAGGED: Flag = Flag(Cow::Borrowed("flagged"));
    pub const ANSWERED: Flag = Flag(Cow::Borrowed("answered"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Flag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A message to deposit into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Raw RFC 822 header block.
    pub headers: String,
    pub body: String,
    /// Delivery time, Unix seconds.
    pub stamp: i64,
}

impl NewMessage {
    pub fn size(&self) -> u64 {
        (self.headers.len() + self.body.len()) as u64
    }
}

/// Header-level view of a stored message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub id: MessageId,
    pub headers: String,
    pub stamp: i64,
    pub size: u64,
    pub flags: BTreeSet<Flag>,
}

impl MessageHeader {
    pub fn has_flag(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    pub fn is_seen(&self) -> bool {
        self.has_flag(&Flag::SEEN)
    }

    pub fn is_deleted(&self) -> bool {
        self.has_flag(&Flag::DELETED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_constants_equal_owned_names() {
        assert_eq!(Flag::SEEN, Flag::new("seen"));
        assert_eq!(Flag::from("deleted"), Flag::DELETED);
        assert_ne!(Flag::SEEN, Flag::DELETED);
    }

    #[test]
    fn test_message_id_display() {
        assert_eq!(MessageId(7).to_string(), "7");
    }

    #[test]
    fn test_new_message_size() {
        let msg = NewMessage {
            headers: "Subject: hi\r\n".into(),
            body: "body".into(),
            stamp: 0,
        };
        assert_eq!(msg.size(), 17);
    }
}
