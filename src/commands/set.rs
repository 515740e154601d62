use bytes::Bytes;
use tokio::time::Duration;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Set `key` to hold the string `value`. If `key` already holds a value, it is overwritten and
/// any previous time to live is discarded. `EX seconds` sets a time to live.
///
/// Ref: <https://redis.io/docs/latest/commands/set/>
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: Bytes,
    pub value: Bytes,
    pub ttl: Option<Duration>,
}

impl Executable for Set {
    fn exec(self, store: &Store) -> Frame {
        let mut store = store.lock();

        match self.ttl {
            Some(ttl) => store.set_with_ttl(self.key, self.value, ttl),
            None => store.set(self.key, self.value, None),
        }

        Frame::Simple("OK".to_string())
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        // SET key value [EX seconds]
        if !matches!(parser.remaining(), 2 | 4) {
            return Err(parser.wrong_arity());
        }

        let key = parser.next_bytes()?;
        let value = parser.next_bytes()?;

        let ttl = match parser.next_optional() {
            Some(option) if option.eq_ignore_ascii_case(b"EX") => {
                let seconds = parser.next_integer()?;
                if seconds <= 0 {
                    return Err(CommandParserError::InvalidExpireTime { command: "set" });
                }
                Some(Duration::from_secs(seconds as u64))
            }
            // Any other option is skipped together with its value.
            Some(_) => {
                parser.next_bytes()?;
                None
            }
            None => None,
        };

        Ok(Self { key, value, ttl })
    }
}
