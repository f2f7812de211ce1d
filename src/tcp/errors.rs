use std::io;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TcpError {
    #[error("Stream closed")]
    StreamClosed, // EPIPE

    #[error("Stream has an unrecoverable error")]
    StreamError, // ECONNRESET

    #[error("Invalid config: {0}")]
    InvalidConfig(String), // EINVAL
}

impl From<TcpError> for io::Error {
    fn from(err: TcpError) -> Self {
        let kind = match err {
            TcpError::StreamClosed => io::ErrorKind::BrokenPipe,
            TcpError::StreamError => io::ErrorKind::ConnectionReset,
            TcpError::InvalidConfig(_) => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, err)
    }
}

// -- Unit tests --
