use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub packets_sent: u64,
    /// Dropped by simulated loss.
    pub packets_lost: u64,
    /// Dropped because the in-flight queue was full.
    pub packets_overflowed: u64,
    pub packets_delivered: u64,
    pub bytes_sent: u64,
    pub bytes_delivered: u64,
}

impl LinkStats {
    pub fn loss_percent(&self) -> f64 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        (self.packets_lost + self.packets_overflowed) as f64 * 100.0 / self.packets_sent as f64
    }
}

/// Bytes sent over a trailing time window.
#[derive(Debug, Clone)]
pub struct BandwidthTracker {
    window: f64,
    samples: VecDeque<(f64, usize)>,
    bytes_in_window: usize,
}

impl BandwidthTracker {
    pub fn new(window: f64) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
            bytes_in_window: 0,
        }
    }

    pub fn record(&mut self, time: f64, bytes: usize) {
        self.samples.push_back((time, bytes));
        self.bytes_in_window += bytes;
        self.expire(time);
    }

    pub fn expire(&mut self, now: f64) {
        while let Some(&(time, bytes)) = self.samples.front() {
            if now - time < self.window {
                break;
            }
            self.bytes_in_window -= bytes;
            self.samples.pop_front();
        }
    }

    pub fn kbps(&self) -> f64 {
        self.bytes_in_window as f64 * 8.0 / 1000.0 / self.window
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.bytes_in_window = 0;
    }
}
