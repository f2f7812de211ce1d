use crate::tcp::byte_stream::{read, Reader};
use crate::tcp::config::TcpConfig;
use crate::tcp::errors::TcpError;
use crate::tcp::sender_flags::SenderFlags;
use crate::tcp::tcp_message::{TcpReceiverMessage, TcpSenderMessage};
use crate::tcp::timer::RetransmissionTimer;
use crate::tcp::wrap32::Wrap32;
use std::cmp::Ordering;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Order two wire seqnos by unwrapping both against the same `checkpoint`
pub fn compare_seqno(left: Wrap32, right: Wrap32, isn: Wrap32, checkpoint: u64) -> Ordering {
    left.unwrap(isn, checkpoint).cmp(&right.unwrap(isn, checkpoint))
}

/// The outbound stream ended gracefully; a broken stream never ends with a FIN
fn ended(outbound: &impl Reader) -> bool {
    outbound.is_finished() && !outbound.has_error()
}

/// The outbound stream is closed and its remaining bytes fit in `len`
fn ended_within(outbound: &impl Reader, len: u64) -> bool {
    outbound.bytes_buffered() <= len && outbound.input_ended() && !outbound.has_error()
}

/// A segment on the outstanding ledger
#[derive(Debug)]
struct Outstanding {
    message: TcpSenderMessage,
    sent: bool,
}

impl Outstanding {
    /// The wire seqno just past this segment
    fn end(&self) -> Wrap32 {
        self.message.seqno + self.message.sequence_length() as u32
    }
}

/// The sender end of a connection.
///
/// `push` turns outbound bytes into segments on the ledger; `maybe_send` hands them out one at
/// a time; `receive` and `tick` prune acknowledged segments and schedule retransmissions.
#[derive(Debug)]
pub struct TcpSender {
    isn: Wrap32,
    ackno: Wrap32,          // Cumulative ackno from the peer
    window_size: u64,       // Advertised by the peer; 1 until the first ack
    next_seqno: u64,        // Absolute seqno of the next new sequence number
    max_payload_size: u64,
    flags: SenderFlags,
    retransmissions: u64,   // Consecutive retransmissions since the last progress
    timer: RetransmissionTimer,
    outstanding: VecDeque<Outstanding>,
}

impl TcpSender {
    pub fn new(config: &TcpConfig) -> Result<Self, TcpError> {
        config.validate()?;
        let isn = config.initial_seqno();
        Ok(TcpSender {
            isn,
            ackno: isn,
            window_size: 1,
            next_seqno: 0,
            max_payload_size: config.max_payload_size,
            flags: SenderFlags::empty(),
            retransmissions: 0,
            timer: RetransmissionTimer::new(config.rt_timeout),
            outstanding: VecDeque::new(),
        })
    }

    /// Segment as much of `outbound` as the peer's window allows
    pub fn push(&mut self, outbound: &mut impl Reader) {
        if self.flags.contains(SenderFlags::FIN_SENT) {
            return;
        }

        if !self.flags.contains(SenderFlags::SYN_SENT) {
            let mut message = TcpSenderMessage::new(self.isn);
            message.syn = true;

            // Only a closed stream that fits entirely rides along with the SYN
            if ended_within(outbound, self.max_payload_size) {
                read(outbound, self.max_payload_size, &mut message.payload);
                message.fin = true;
            }

            self.flags.insert(SenderFlags::SYN_SENT);
            if message.fin {
                self.flags.insert(SenderFlags::FIN_SENT);
            }
            self.enqueue(message);
            return;
        }

        if !self.flags.contains(SenderFlags::SYN_ACKED) {
            return;
        }

        // A zero window is treated as one so a probe can discover it reopening
        let window = self.window_size.max(1);
        let mut available = window.saturating_sub(self.sequence_numbers_in_flight());

        while available > 0 {
            let mut message = TcpSenderMessage::new(Wrap32::wrap(self.next_seqno, self.isn));

            if ended(outbound) {
                message.fin = true;
                self.flags.insert(SenderFlags::FIN_SENT);
                self.enqueue(message);
                break;
            }

            let len = available
                .min(self.max_payload_size)
                .min(outbound.bytes_buffered());
            if len == 0 {
                break;
            }
            read(outbound, len, &mut message.payload);

            if ended(outbound) && available > len {
                message.fin = true;
                self.flags.insert(SenderFlags::FIN_SENT);
            }

            available -= message.sequence_length();
            let fin = message.fin;
            self.enqueue(message);
            if fin {
                break;
            }
        }
    }

    /// The earliest segment not yet handed out, if any
    pub fn maybe_send(&mut self) -> Option<TcpSenderMessage> {
        let entry = self.outstanding.iter_mut().find(|entry| !entry.sent)?;
        entry.sent = true;
        trace!(message = %entry.message, "sending segment");
        Some(entry.message.clone())
    }

    /// A zero-length segment that only carries the current seqno
    pub fn send_empty_message(&self) -> TcpSenderMessage {
        TcpSenderMessage::new(Wrap32::wrap(self.next_seqno, self.isn))
    }

    /// Handle an ackno and window advertisement from the peer's receiver
    pub fn receive(&mut self, msg: &TcpReceiverMessage) {
        if let Some(ackno) = msg.ackno {
            self.handle_ack(ackno, msg.window_size as u64);
        }

        if self.flags.contains(SenderFlags::SYN_ACKED) {
            self.prune_acked();
        }
    }

    /// Time has passed; retransmit the earliest outstanding segment once the RTO expires
    pub fn tick(&mut self, ms_elapsed: u64) {
        if self.flags.contains(SenderFlags::SYN_ACKED) {
            self.prune_acked();
        }

        let Some(earliest) = self.outstanding.iter_mut().find(|entry| entry.sent) else {
            // Nothing in flight, so the timer is not running
            self.timer.restart();
            return;
        };

        self.timer.tick(ms_elapsed);
        if !self.timer.is_expired() {
            return;
        }

        debug!(
            message = %earliest.message,
            rto = self.timer.rto(),
            "retransmission timeout"
        );
        earliest.sent = false;
        self.timer.restart();

        let zero_window_probe =
            self.flags.contains(SenderFlags::SYN_ACKED) && self.window_size == 0;
        if !zero_window_probe {
            self.timer.back_off();
            self.retransmissions += 1;
        }
    }

    /// Sequence numbers on the ledger that the peer has not acknowledged
    pub fn sequence_numbers_in_flight(&self) -> u64 {
        self.outstanding
            .iter()
            .map(|entry| entry.message.sequence_length())
            .sum()
    }

    pub fn consecutive_retransmissions(&self) -> u64 {
        self.retransmissions
    }

    pub fn isn(&self) -> Wrap32 {
        self.isn
    }

    /// The current retransmission timeout in milliseconds
    pub fn rto(&self) -> u64 {
        self.timer.rto()
    }

    fn enqueue(&mut self, message: TcpSenderMessage) {
        trace!(%message, "segment queued");
        self.next_seqno += message.sequence_length();
        self.outstanding.push_back(Outstanding {
            message,
            sent: false,
        });
    }

    fn handle_ack(&mut self, ackno: Wrap32, window_size: u64) {
        let abs_ackno = ackno.unwrap(self.isn, self.next_seqno);
        if abs_ackno > self.next_seqno {
            trace!(%ackno, "ignoring ackno beyond anything sent");
            return;
        }

        if !self.flags.contains(SenderFlags::SYN_ACKED) {
            // Wait for an ack that covers the SYN
            if !self.flags.contains(SenderFlags::SYN_SENT) || abs_ackno == 0 {
                return;
            }
            debug!(%ackno, window_size, "SYN acknowledged");
            self.flags.insert(SenderFlags::SYN_ACKED);
            self.window_size = window_size;
            self.advance(ackno);
            return;
        }

        match compare_seqno(self.ackno, ackno, self.isn, self.next_seqno) {
            Ordering::Greater => trace!(%ackno, "ignoring stale ackno"),
            Ordering::Equal => self.window_size = window_size,
            Ordering::Less => {
                self.window_size = window_size;
                self.advance(ackno);
            }
        }
    }

    /// New data was acknowledged: reset the backoff state
    fn advance(&mut self, ackno: Wrap32) {
        self.ackno = ackno;
        self.timer.reset_rto();
        self.timer.restart();
        self.retransmissions = 0;
    }

    fn prune_acked(&mut self) {
        let (ackno, isn, checkpoint) = (self.ackno, self.isn, self.next_seqno);
        self.outstanding.retain(|entry| {
            let acked =
                entry.sent && compare_seqno(ackno, entry.end(), isn, checkpoint) != Ordering::Less;
            if acked {
                trace!(message = %entry.message, "segment acknowledged");
            }
            !acked
        });
    }
}

// -- Unit tests --
