use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::stats::{BandwidthTracker, LinkStats};
use crate::config::LinkConfig;

#[derive(Debug)]
struct DelayedPacket {
    delivery_time: f64,
    id: u64,
    payload: Vec<u8>,
}

impl PartialEq for DelayedPacket {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DelayedPacket {}

impl PartialOrd for DelayedPacket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedPacket {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap; equal times leave in send order
        other
            .delivery_time
            .total_cmp(&self.delivery_time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// One-way link with simulated latency, jitter and loss, driven by simulated time.
#[derive(Debug)]
pub struct NetworkSimulator {
    config: LinkConfig,
    rng: Pcg32,
    queue: BinaryHeap<DelayedPacket>,
    time: f64,
    next_id: u64,
    bandwidth: BandwidthTracker,
    stats: LinkStats,
}

impl NetworkSimulator {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(config.seed),
            bandwidth: BandwidthTracker::new(config.bandwidth_window),
            queue: BinaryHeap::new(),
            time: 0.0,
            next_id: 0,
            stats: LinkStats::default(),
            config,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Applies new link conditions. Packets already in flight keep their delivery times.
    pub fn set_config(&mut self, config: LinkConfig) {
        if config.bandwidth_window != self.config.bandwidth_window {
            self.bandwidth = BandwidthTracker::new(config.bandwidth_window);
        }
        self.config = config;
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn advance(&mut self, dt: f64) {
        self.time += dt;
        self.bandwidth.expire(self.time);
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
        self.bandwidth.expire(time);
    }

    fn should_drop(&mut self) -> bool {
        self.config.loss_percent > 0.0 && self.rng.random::<f64>() * 100.0 < self.config.loss_percent
    }

    fn delay(&mut self) -> f64 {
        let jitter = if self.config.jitter > 0.0 {
            self.rng.random_range(-self.config.jitter..=self.config.jitter)
        } else {
            0.0
        };
        (self.config.latency + jitter).max(0.0)
    }

    /// Queues `payload` for delivery. Returns `false` if the packet was dropped.
    pub fn send(&mut self, payload: Vec<u8>) -> bool {
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += payload.len() as u64;
        self.bandwidth.record(self.time, payload.len());

        if self.should_drop() {
            self.stats.packets_lost += 1;
            return false;
        }
        if self.queue.len() >= self.config.capacity {
            self.stats.packets_overflowed += 1;
            log::debug!("link queue full, dropping {} byte packet", payload.len());
            return false;
        }

        let delivery_time = self.time + self.delay();
        self.queue.push(DelayedPacket {
            delivery_time,
            id: self.next_id,
            payload,
        });
        self.next_id += 1;
        true
    }

    /// Oldest packet whose delivery time has passed.
    pub fn receive(&mut self) -> Option<Vec<u8>> {
        if self.queue.peek()?.delivery_time > self.time {
            return None;
        }
        let packet = self.queue.pop()?;
        self.stats.packets_delivered += 1;
        self.stats.bytes_delivered += packet.payload.len() as u64;
        Some(packet.payload)
    }

    pub fn receive_all(&mut self) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| self.receive()).collect()
    }

    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }

    pub fn bandwidth_kbps(&self) -> f64 {
        self.bandwidth.kbps()
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Drops everything in flight and restarts the clock.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.bandwidth.reset();
        self.stats = LinkStats::default();
        self.time = 0.0;
        self.next_id = 0;
        self.rng = Pcg32::seed_from_u64(self.config.seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(latency: f64, jitter: f64, loss_percent: f64) -> NetworkSimulator {
        NetworkSimulator::new(LinkConfig {
            latency,
            jitter,
            loss_percent,
            seed: 42,
            ..LinkConfig::default()
        })
    }

    #[test]
    fn delivers_after_latency() {
        let mut sim = link(0.1, 0.0, 0.0);
        assert!(sim.send(vec![1, 2, 3]));
        assert_eq!(sim.receive(), None);

        sim.advance(0.05);
        assert_eq!(sim.receive(), None);
        sim.advance(0.05);
        assert_eq!(sim.receive(), Some(vec![1, 2, 3]));
        assert_eq!(sim.receive(), None);
        assert_eq!(sim.stats().packets_delivered, 1);
    }

    #[test]
    fn equal_delivery_times_keep_send_order() {
        let mut sim = link(0.0, 0.0, 0.0);
        for i in 0..5u8 {
            sim.send(vec![i]);
        }
        let received: Vec<u8> = sim.receive_all().into_iter().map(|p| p[0]).collect();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn jitter_reorders_but_delivers_in_time_order() {
        let mut sim = link(0.1, 0.05, 0.0);
        for i in 0..100u8 {
            sim.send(vec![i]);
            sim.advance(0.001);
        }
        sim.advance(1.0);

        let received: Vec<u8> = sim.receive_all().into_iter().map(|p| p[0]).collect();
        assert_eq!(received.len(), 100);
        assert!(received.windows(2).any(|pair| pair[0] > pair[1]));
    }

    #[test]
    fn loss_rate_is_roughly_configured() {
        let mut sim = link(0.0, 0.0, 25.0);
        let delivered = (0..4000).filter(|_| sim.send(vec![0])).count();
        assert!((2700..3300).contains(&delivered), "delivered {delivered}");
        assert_eq!(sim.stats().packets_lost as usize, 4000 - delivered);
    }

    #[test]
    fn full_queue_drops_new_packets() {
        let mut sim = NetworkSimulator::new(LinkConfig {
            latency: 1.0,
            capacity: 2,
            ..LinkConfig::default()
        });
        assert!(sim.send(vec![0]));
        assert!(sim.send(vec![1]));
        assert!(!sim.send(vec![2]));
        assert_eq!(sim.stats().packets_overflowed, 1);
        assert_eq!(sim.in_flight(), 2);
    }

    #[test]
    fn bandwidth_covers_recent_sends() {
        let mut sim = link(0.0, 0.0, 0.0);
        for _ in 0..30 {
            sim.send(vec![0; 125]);
            sim.advance(1.0 / 60.0);
        }
        // 125 bytes at 60 Hz is 60 kbps
        assert!((sim.bandwidth_kbps() - 60.0).abs() < 5.0);
    }

    #[test]
    fn reset_drops_in_flight() {
        let mut sim = link(0.5, 0.0, 0.0);
        sim.send(vec![9]);
        sim.reset();
        sim.advance(1.0);
        assert_eq!(sim.receive(), None);
        assert_eq!(sim.in_flight(), 0);
        assert_eq!(sim.time(), 1.0);
    }
}
