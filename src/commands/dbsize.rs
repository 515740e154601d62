use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Return the number of keys in the currently-selected database.
///
/// Ref: <https://redis.io/docs/latest/commands/dbsize>
#[derive(Debug, PartialEq)]
pub struct DBSize;

impl Executable for DBSize {
    fn exec(self, store: &Store) -> Frame {
        Frame::Integer(store.lock().len() as i64)
    }
}

impl TryFrom<&mut CommandParser> for DBSize {
    type Error = CommandParserError;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{command_frame, execute};

    #[test]
    fn counts_keys() {
        let store = Store::new();
        assert_eq!(execute(command_frame(&["DBSIZE"]), &store), Frame::Integer(0));

        execute(command_frame(&["SET", "a", "1"]), &store);
        execute(command_frame(&["SET", "b", "2"]), &store);
        execute(command_frame(&["SET", "a", "3"]), &store);

        assert_eq!(execute(command_frame(&["dbsize"]), &store), Frame::Integer(2));
    }

    #[test]
    fn takes_no_arguments() {
        let res = execute(command_frame(&["DBSIZE", "0"]), &Store::new());

        assert_eq!(
            res,
            Frame::Error("ERR wrong number of arguments for 'dbsize' command".to_string())
        );
    }
}
