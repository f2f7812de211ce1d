//! A TCP-like reliable transport core: a flow-controlled byte stream, an
//! out-of-order reassembler, 32-bit wraparound sequence numbers, and the
//! sender/receiver state machines that tie them together.
//!
//! Everything here is synchronous and single threaded. The caller owns the
//! substrate that ships [`TcpSenderMessage`]s and [`TcpReceiverMessage`]s
//! between peers and drives time forward through [`TcpSender::tick`].

pub mod tcp;

pub use tcp::{
    ByteStream, Reader, Reassembler, TcpConfig, TcpError, TcpReceiver, TcpReceiverMessage,
    TcpSender, TcpSenderMessage, Wrap32, Writer,
};
