use std::fmt;
use std::ops::Add;

/// A 32-bit wire sequence number; an absolute stream offset modulo 2^32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Wrap32 {
    value: u32,
}

impl Wrap32 {
    const WRAP_SIZE: u64 = 1 << 32;
    const HALF_WRAP: u64 = 1 << 31;
    const HIGH_BITS: u64 = 0xFFFF_FFFF_0000_0000;

    pub fn new(value: u32) -> Self {
        Wrap32 { value }
    }

    pub fn raw_value(&self) -> u32 {
        self.value
    }

    /// Wrap an absolute `seq_no` given the `zero_point` (usually the ISN)
    pub fn wrap(n: u64, zero_point: Wrap32) -> Self {
        zero_point + n as u32
    }

    /// Unwrap to the absolute `seq_no` closest to the `checkpoint`.
    ///
    /// Candidates differ by whole epochs of 2^32. The result starts in the checkpoint's own
    /// epoch and moves one epoch up or down only when the in-epoch distance is strictly
    /// greater than 2^31, so a tie at exactly 2^31 keeps the checkpoint's epoch.
    pub fn unwrap(&self, zero_point: Wrap32, checkpoint: u64) -> u64 {
        let residual = self.value.wrapping_sub(zero_point.value);
        let low = checkpoint as u32;
        let distance = residual.abs_diff(low) as u64;

        let same_epoch = (checkpoint & Self::HIGH_BITS) + residual as u64;
        if distance <= Self::HALF_WRAP {
            return same_epoch;
        }

        if residual >= low {
            // The previous epoch is closer, unless there is no previous epoch
            if same_epoch >= Self::WRAP_SIZE {
                same_epoch - Self::WRAP_SIZE
            } else {
                same_epoch
            }
        } else {
            same_epoch + Self::WRAP_SIZE
        }
    }
}

impl Add<u32> for Wrap32 {
    type Output = Wrap32;

    fn add(self, rhs: u32) -> Wrap32 {
        Wrap32::new(self.value.wrapping_add(rhs))
    }
}

impl fmt::Display for Wrap32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

// -- Unit tests --
