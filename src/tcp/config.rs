use crate::tcp::errors::TcpError;
use crate::tcp::wrap32::Wrap32;
use rand::Rng;

/// Tunables shared by a sender/receiver pair
#[derive(Debug, Clone, PartialEq)]
pub struct TcpConfig {
    pub capacity: u64,         // Byte capacity of each direction's stream
    pub max_payload_size: u64, // Largest payload carried by one segment
    pub rt_timeout: u64,       // Initial retransmission timeout in milliseconds
    pub isn: Option<Wrap32>,   // Fixed ISN; random when `None`
}

impl TcpConfig {
    pub const DEFAULT_CAPACITY: u64 = 64_000;
    pub const MAX_PAYLOAD_SIZE: u64 = 1000;
    pub const TIMEOUT_DFLT: u64 = 1000;

    pub fn validate(&self) -> Result<(), TcpError> {
        if self.max_payload_size == 0 {
            return Err(TcpError::InvalidConfig(
                "max_payload_size must be positive".to_string(),
            ));
        }
        if self.rt_timeout == 0 {
            return Err(TcpError::InvalidConfig(
                "rt_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured ISN, or a fresh random one
    pub fn initial_seqno(&self) -> Wrap32 {
        self.isn.unwrap_or_else(Self::random_isn)
    }

    pub fn random_isn() -> Wrap32 {
        Wrap32::new(rand::thread_rng().gen())
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            capacity: Self::DEFAULT_CAPACITY,
            max_payload_size: Self::MAX_PAYLOAD_SIZE,
            rt_timeout: Self::TIMEOUT_DFLT,
            isn: None,
        }
    }
}

// -- Unit tests --
