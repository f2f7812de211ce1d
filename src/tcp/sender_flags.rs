use bitflags::bitflags;

bitflags! {
    // Lifecycle of a `TcpSender`; each bit is set once and never cleared
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SenderFlags: u8 {
        const SYN_SENT = 1 << 0;
        const SYN_ACKED = 1 << 1;
        const FIN_SENT = 1 << 2;
    }
}

// -- Unit tests --
