use crate::tcp::byte_stream::Writer;
use crate::tcp::reassembler::Reassembler;
use crate::tcp::tcp_message::{TcpReceiverMessage, TcpSenderMessage};
use crate::tcp::wrap32::Wrap32;
use tracing::{debug, trace};

/// The receiver end of a connection.
///
/// Feeds segments into the `Reassembler` and reports the ackno and window back to the peer.
/// Whether the FIN has been assembled is read off the inbound stream's closed flag.
#[derive(Debug, Default)]
pub struct TcpReceiver {
    isn: Option<Wrap32>, // Captured from the first SYN
    reassembler: Reassembler,
}

impl TcpReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle one segment from the peer's sender
    pub fn receive(&mut self, message: &TcpSenderMessage, inbound: &mut impl Writer) {
        if message.syn && self.isn.is_none() {
            debug!(isn = %message.seqno, "SYN received");
            self.isn = Some(message.seqno);
        }

        let Some(isn) = self.isn else {
            trace!(%message, "dropping segment before SYN");
            return;
        };

        // Absolute seqno of the next expected byte; the SYN occupies 0
        let checkpoint = self.reassembler.first_unassembled_index() + 1;
        let abs_seqno = message.seqno.unwrap(isn, checkpoint);
        if !message.syn && abs_seqno == 0 {
            trace!(%message, "dropping segment that overlaps the SYN");
            return;
        }

        let stream_index = abs_seqno.saturating_sub(1);
        self.reassembler
            .insert(stream_index, &message.payload, message.fin, inbound);
    }

    /// The ackno and window to advertise to the peer's sender
    pub fn send(&self, inbound: &impl Writer) -> TcpReceiverMessage {
        let window_size = inbound.available_capacity().min(u16::MAX as u64) as u16;
        let ackno = self.isn.map(|isn| {
            let fin = inbound.is_closed() as u64;
            Wrap32::wrap(inbound.bytes_pushed() + 1 + fin, isn)
        });

        TcpReceiverMessage { ackno, window_size }
    }

    pub fn isn(&self) -> Option<Wrap32> {
        self.isn
    }

    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }
}

// -- Unit tests --
