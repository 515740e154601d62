use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Returns how many of the given keys exist. A key mentioned several times is counted each time.
///
/// Ref: <https://redis.io/docs/latest/commands/exists>
#[derive(Debug, PartialEq)]
pub struct Exists {
    pub keys: Vec<Bytes>,
}

impl Executable for Exists {
    fn exec(self, store: &Store) -> Frame {
        let store = store.lock();
        let count = self.keys.iter().filter(|key| store.exists(key)).count();

        Frame::Integer(count as i64)
    }
}

impl TryFrom<&mut CommandParser> for Exists {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let keys = parser.rest();
        if keys.is_empty() {
            return Err(parser.wrong_arity());
        }

        Ok(Self { keys })
    }
}
