/// Retransmission timer with exponential backoff. Time only moves through `tick`.
#[derive(Debug, Clone)]
pub struct RetransmissionTimer {
    initial_rto: u64,
    rto: u64,
    elapsed: u64,
}

impl RetransmissionTimer {
    pub fn new(initial_rto: u64) -> Self {
        RetransmissionTimer {
            initial_rto,
            rto: initial_rto,
            elapsed: 0,
        }
    }

    pub fn tick(&mut self, ms_elapsed: u64) {
        self.elapsed = self.elapsed.saturating_add(ms_elapsed);
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed >= self.rto
    }

    /// Start counting from zero again
    pub fn restart(&mut self) {
        self.elapsed = 0;
    }

    pub fn back_off(&mut self) {
        self.rto = self.rto.saturating_mul(2);
    }

    pub fn reset_rto(&mut self) {
        self.rto = self.initial_rto;
    }

    pub fn rto(&self) -> u64 {
        self.rto
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }
}

// -- Unit tests --
