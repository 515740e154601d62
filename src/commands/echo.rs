use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Returns `message` as a bulk string.
///
/// Ref: <https://redis.io/docs/latest/commands/echo>
#[derive(Debug, PartialEq)]
pub struct Echo {
    pub message: Bytes,
}

impl Executable for Echo {
    fn exec(self, _store: &Store) -> Frame {
        Frame::Bulk(self.message)
    }
}

impl TryFrom<&mut CommandParser> for Echo {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let message = parser.next_bytes()?;
        Ok(Self { message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{command_frame, execute, Command};

    #[test]
    fn echoes_the_message() {
        let cmd = Command::try_from(command_frame(&["ECHO", "hello world"])).unwrap();

        let res = cmd.exec(&Store::new());

        assert_eq!(res, Frame::Bulk(Bytes::from("hello world")));
    }

    #[test]
    fn wrong_number_of_arguments() {
        let store = Store::new();
        let expected = Frame::Error("ERR wrong number of arguments for 'echo' command".to_string());

        assert_eq!(execute(command_frame(&["ECHO"]), &store), expected);
        assert_eq!(execute(command_frame(&["echo", "a", "b"]), &store), expected);
    }
}
