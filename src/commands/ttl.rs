use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::{KeyTtl, Store};

/// TTL returns the remaining time to live of a key that has a timeout. This introspection
/// capability allows a client to check how many seconds a given key will continue to be part
/// of the dataset.
///
/// Replies `-2` if the key does not exist and `-1` if it exists without an expiration.
///
/// Ref: <https://redis.io/docs/latest/commands/ttl>
#[derive(Debug, PartialEq)]
pub struct Ttl {
    pub key: Bytes,
}

impl Executable for Ttl {
    fn exec(self, store: &Store) -> Frame {
        let ttl = match store.lock().ttl(&self.key) {
            KeyTtl::Missing => -2,
            KeyTtl::Persistent => -1,
            // Rounded to the nearest second.
            KeyTtl::Expires(remaining) => ((remaining.as_millis() + 500) / 1000) as i64,
        };

        Frame::Integer(ttl)
    }
}

impl TryFrom<&mut CommandParser> for Ttl {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_bytes()?;
        Ok(Self { key })
    }
}
