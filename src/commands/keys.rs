use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::store::Store;

/// Returns every key that has not expired. The pattern argument is accepted but not applied:
/// the reply always holds all keys, in no particular order.
///
/// Ref: <https://redis.io/docs/latest/commands/keys>
#[derive(Debug, PartialEq)]
pub struct Keys {
    pub pattern: Option<Bytes>,
}

impl Executable for Keys {
    fn exec(self, store: &Store) -> Frame {
        let keys = store.lock().keys();

        Frame::Array(keys.into_iter().map(Frame::Bulk).collect())
    }
}

impl TryFrom<&mut CommandParser> for Keys {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let pattern = parser.next_optional();
        Ok(Self { pattern })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{command_frame, Command};
    use tokio::time::{self, Duration};

    fn sorted(frame: Frame) -> Vec<Frame> {
        match frame {
            Frame::Array(mut keys) => {
                keys.sort_by_key(|key| key.to_string());
                keys
            }
            frame => panic!("expected an array, got {:?}", frame),
        }
    }

    #[test]
    fn with_wildcard_pattern() {
        let cmd = Command::try_from(command_frame(&["KEYS", "*"])).unwrap();
        assert_eq!(
            cmd,
            Command::Keys(Keys {
                pattern: Some(Bytes::from("*"))
            })
        );
    }

    #[test]
    fn pattern_is_ignored() {
        let store = Store::new();
        {
            let mut state = store.lock();
            state.set(Bytes::from("foo"), Bytes::from("1"), None);
            state.set(Bytes::from("bar"), Bytes::from("2"), None);
        }

        for parts in [vec!["KEYS"], vec!["KEYS", "f*"], vec!["KEYS", "nothing"]] {
            let cmd = Command::try_from(command_frame(&parts)).unwrap();

            assert_eq!(
                sorted(cmd.exec(&store)),
                vec![Frame::Bulk(Bytes::from("bar")), Frame::Bulk(Bytes::from("foo"))]
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn skips_expired_keys() {
        let store = Store::new();
        {
            let mut state = store.lock();
            state.set_with_ttl(Bytes::from("short"), Bytes::from("1"), Duration::from_secs(1));
            state.set(Bytes::from("long"), Bytes::from("2"), None);
        }

        time::advance(Duration::from_secs(1)).await;

        let cmd = Command::try_from(command_frame(&["KEYS", "*"])).unwrap();
        assert_eq!(cmd.exec(&store), Frame::Array(vec![Frame::Bulk(Bytes::from("long"))]));
    }

    #[test]
    fn empty_store() {
        let cmd = Command::try_from(command_frame(&["KEYS"])).unwrap();

        assert_eq!(cmd.exec(&Store::new()), Frame::Array(vec![]));
    }

    #[test]
    fn too_many_arguments() {
        let err = Command::try_from(command_frame(&["KEYS", "a", "b"])).unwrap_err();

        assert_eq!(err, CommandParserError::WrongArity { command: "keys" });
    }
}
