use crate::tcp::wrap32::Wrap32;
use std::fmt;

/// A segment travelling from a `TcpSender` to the peer's `TcpReceiver`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TcpSenderMessage {
    pub seqno: Wrap32,
    pub syn: bool,
    pub payload: Vec<u8>,
    pub fin: bool,
}

impl TcpSenderMessage {
    pub fn new(seqno: Wrap32) -> Self {
        TcpSenderMessage {
            seqno,
            ..Default::default()
        }
    }

    /// Sequence numbers occupied: SYN and FIN count one each
    pub fn sequence_length(&self) -> u64 {
        self.payload.len() as u64 + self.syn as u64 + self.fin as u64
    }
}

impl fmt::Display for TcpSenderMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seqno={}", self.seqno)?;
        if self.syn {
            write!(f, " +SYN")?;
        }
        if !self.payload.is_empty() {
            write!(f, " payload={}B", self.payload.len())?;
        }
        if self.fin {
            write!(f, " +FIN")?;
        }
        Ok(())
    }
}

/// An acknowledgment and window advertisement from a `TcpReceiver`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpReceiverMessage {
    pub ackno: Option<Wrap32>,
    pub window_size: u16,
}

// -- Unit tests --
