pub mod dbsize;
pub mod del;
pub mod echo;
pub mod executable;
pub mod exists;
pub mod get;
pub mod keys;
pub mod ping;
pub mod set;
pub mod ttl;

use bytes::Bytes;
use std::str::{self, FromStr};
use std::vec;
use strum_macros::{EnumString, IntoStaticStr};
use thiserror::Error as ThisError;
use tracing::debug;

use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::store::Store;

use dbsize::DBSize;
use del::Del;
use echo::Echo;
use exists::Exists;
use get::Get;
use keys::Keys;
use ping::Ping;
use set::Set;
use ttl::Ttl;

/// Upper bound on the number of parts in a command, the name included.
pub const MAX_ARGS: usize = 10;

#[derive(Debug, PartialEq)]
pub enum Command {
    DBSize(DBSize),
    Del(Del),
    Echo(Echo),
    Exists(Exists),
    Get(Get),
    Keys(Keys),
    Ping(Ping),
    Set(Set),
    Ttl(Ttl),
}

impl Executable for Command {
    fn exec(self, store: &Store) -> Frame {
        match self {
            Command::DBSize(cmd) => cmd.exec(store),
            Command::Del(cmd) => cmd.exec(store),
            Command::Echo(cmd) => cmd.exec(store),
            Command::Exists(cmd) => cmd.exec(store),
            Command::Get(cmd) => cmd.exec(store),
            Command::Keys(cmd) => cmd.exec(store),
            Command::Ping(cmd) => cmd.exec(store),
            Command::Set(cmd) => cmd.exec(store),
            Command::Ttl(cmd) => cmd.exec(store),
        }
    }
}

/// Runs one request against the store. Requests that cannot be parsed into a command are
/// answered with an error frame, so there is always a reply to send.
pub fn execute(frame: Frame, store: &Store) -> Frame {
    match Command::try_from(frame) {
        Ok(cmd) => cmd.exec(store),
        Err(err) => {
            debug!("Rejected command: {}", err);
            Frame::Error(err.to_string())
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = CommandParserError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the server as RESP arrays of bulk strings.
        let frames = match frame {
            Frame::Array(frames) if !frames.is_empty() => frames,
            _ => return Err(CommandParserError::InvalidCommand),
        };

        if frames.len() > MAX_ARGS {
            return Err(CommandParserError::TooManyArguments);
        }

        let parts = frames
            .into_iter()
            .map(|frame| match frame {
                Frame::Bulk(bytes) => Ok(bytes),
                _ => Err(CommandParserError::InvalidArgumentType),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut parts = parts.into_iter();
        let name = match parts.next() {
            Some(name) => parse_command_name(&name)?,
            None => return Err(CommandParserError::InvalidCommand),
        };

        let parser = &mut CommandParser { name, parts };

        let command = match name {
            CommandName::Dbsize => DBSize::try_from(&mut *parser).map(Command::DBSize),
            CommandName::Del => Del::try_from(&mut *parser).map(Command::Del),
            CommandName::Echo => Echo::try_from(&mut *parser).map(Command::Echo),
            CommandName::Exists => Exists::try_from(&mut *parser).map(Command::Exists),
            CommandName::Get => Get::try_from(&mut *parser).map(Command::Get),
            CommandName::Keys => Keys::try_from(&mut *parser).map(Command::Keys),
            CommandName::Ping => Ping::try_from(&mut *parser).map(Command::Ping),
            CommandName::Set => Set::try_from(&mut *parser).map(Command::Set),
            CommandName::Ttl => Ttl::try_from(&mut *parser).map(Command::Ttl),
        }?;

        parser.finish()?;

        Ok(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
enum CommandName {
    Dbsize,
    Del,
    Echo,
    Exists,
    Get,
    Keys,
    Ping,
    Set,
    Ttl,
}

fn parse_command_name(name: &[u8]) -> Result<CommandName, CommandParserError> {
    str::from_utf8(name)
        .ok()
        .and_then(|name| CommandName::from_str(name).ok())
        .ok_or_else(|| CommandParserError::UnknownCommand {
            // The name is echoed inside a simple string, which cannot hold line breaks.
            command: String::from_utf8_lossy(name)
                .to_ascii_uppercase()
                .replace(['\r', '\n'], " "),
        })
}

pub struct CommandParser {
    name: CommandName,
    parts: vec::IntoIter<Bytes>,
}

impl CommandParser {
    /// Number of arguments not consumed yet.
    fn remaining(&self) -> usize {
        self.parts.len()
    }

    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        match self.parts.next() {
            Some(bytes) => Ok(bytes),
            None => Err(self.wrong_arity()),
        }
    }

    fn next_optional(&mut self) -> Option<Bytes> {
        self.parts.next()
    }

    fn next_integer(&mut self) -> Result<i64, CommandParserError> {
        let bytes = self.next_bytes()?;

        str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(CommandParserError::NotAnInteger)
    }

    /// Consumes every remaining argument.
    fn rest(&mut self) -> Vec<Bytes> {
        self.parts.by_ref().collect()
    }

    fn wrong_arity(&self) -> CommandParserError {
        CommandParserError::WrongArity {
            command: self.name.into(),
        }
    }

    /// Fails if the command left arguments it does not take.
    fn finish(&self) -> Result<(), CommandParserError> {
        if self.remaining() > 0 {
            return Err(self.wrong_arity());
        }
        Ok(())
    }
}

/// Reasons a request is rejected before it reaches the store. The message of each variant is
/// the exact error text sent back to the client.
#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("ERR invalid command")]
    InvalidCommand,
    #[error("ERR too many arguments")]
    TooManyArguments,
    #[error("ERR invalid argument type")]
    InvalidArgumentType,
    #[error("ERR unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("ERR wrong number of arguments for '{command}' command")]
    WrongArity { command: &'static str },
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,
    #[error("ERR invalid expire time in '{command}' command")]
    InvalidExpireTime { command: &'static str },
}

#[cfg(test)]
pub(crate) fn command_frame(parts: &[&str]) -> Frame {
    Frame::Array(
        parts
            .iter()
            .map(|part| Frame::Bulk(Bytes::from(part.to_string())))
            .collect(),
    )
}
