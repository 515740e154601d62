pub mod codec;
pub mod commands;
pub mod connection;
pub mod frame;
pub mod server;
pub mod store;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("protocol error; {0}")]
    Frame(#[from] frame::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
