pub mod byte_stream;
pub mod config;
pub mod errors;
pub mod reassembler;
pub mod receiver;
pub mod sender;
pub mod sender_flags;
pub mod tcp_message;
pub mod timer;
pub mod wrap32;

// -- Re-export structs for more concise usage

pub use byte_stream::{ByteStream, Reader, Writer};
pub use config::TcpConfig;
pub use errors::TcpError;
pub use reassembler::Reassembler;
pub use receiver::TcpReceiver;
pub use sender::TcpSender;
pub use tcp_message::{TcpReceiverMessage, TcpSenderMessage};
pub use wrap32::Wrap32;
