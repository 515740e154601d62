use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Removes the specified keys, expired or not, and replies with the number of keys that were
/// removed.
///
/// Ref: <https://redis.io/docs/latest/commands/del>
#[derive(Debug, PartialEq)]
pub struct Del {
    pub keys: Vec<Bytes>,
}

impl Executable for Del {
    fn exec(self, store: &Store) -> Frame {
        let mut store = store.lock();
        let count = self.keys.iter().filter(|key| store.remove(key)).count();

        Frame::Integer(count as i64)
    }
}

impl TryFrom<&mut CommandParser> for Del {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let keys = parser.rest();
        if keys.is_empty() {
            return Err(parser.wrong_arity());
        }

        Ok(Self { keys })
    }
}
