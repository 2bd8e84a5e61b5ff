//! Sending and receiving peers, and a loopback session that joins them over simulated links.

mod receiver;
mod sender;

pub use receiver::{Receiver, ReceiverStats};
pub use sender::{Sender, SenderStats};

use crate::codec::DeltaMode;
use crate::config::{ConfigError, SyncConfig};
use crate::metrics::{MetricsSink, NullMetrics};
use crate::net::NetworkSimulator;
use crate::state::{ActiveObject, RigidBodyState, Snapshot};
use crate::view::ObjectUpdate;

/// A sender and a receiver joined by a forward link for snapshots and a backward link for acks.
///
/// Both links share the link configuration; the backward link gets its own seed so the two do
/// not drop the same packets.
#[derive(Debug)]
pub struct SyncSession<M: MetricsSink = NullMetrics> {
    sender: Sender<M>,
    receiver: Receiver<M>,
    forward: NetworkSimulator,
    backward: NetworkSimulator,
    time: f64,
}

impl SyncSession<NullMetrics> {
    pub fn new(config: &SyncConfig, initial: Snapshot<RigidBodyState>) -> Result<Self, ConfigError> {
        Self::with_metrics(config, initial, NullMetrics, NullMetrics)
    }
}

impl<M: MetricsSink> SyncSession<M> {
    pub fn with_metrics(
        config: &SyncConfig,
        initial: Snapshot<RigidBodyState>,
        sender_metrics: M,
        receiver_metrics: M,
    ) -> Result<Self, ConfigError> {
        let sender = Sender::with_metrics(config, initial.clone(), sender_metrics)?;
        let receiver = Receiver::with_metrics(config, initial, receiver_metrics)?;

        let mut backward = config.link.clone();
        backward.seed = backward.seed.wrapping_add(1);

        Ok(Self {
            sender,
            receiver,
            forward: NetworkSimulator::new(config.link.clone()),
            backward: NetworkSimulator::new(backward),
            time: 0.0,
        })
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn sender(&self) -> &Sender<M> {
        &self.sender
    }

    pub fn sender_mut(&mut self) -> &mut Sender<M> {
        &mut self.sender
    }

    pub fn receiver(&self) -> &Receiver<M> {
        &self.receiver
    }

    pub fn receiver_mut(&mut self) -> &mut Receiver<M> {
        &mut self.receiver
    }

    pub fn forward_link(&self) -> &NetworkSimulator {
        &self.forward
    }

    pub fn backward_link(&self) -> &NetworkSimulator {
        &self.backward
    }

    pub fn set_mode(&mut self, mode: DeltaMode) {
        self.sender.set_mode(mode);
    }

    /// Runs one fixed step: acks reach the sender, the sender may send, snapshots reach the
    /// receiver, the receiver acks and refreshes its view.
    pub fn step(&mut self, dt: f64, active: &[ActiveObject]) -> &[ObjectUpdate] {
        self.time += dt;
        self.forward.advance(dt);
        self.backward.advance(dt);

        while let Some(ack) = self.backward.receive() {
            // a corrupt ack is counted by the sender and otherwise ignored
            let _ = self.sender.process_ack(&ack);
        }

        if let Some(packet) = self.sender.update(dt, active) {
            self.forward.send(packet);
        }

        while let Some(packet) = self.forward.receive() {
            // discarded packets behave like losses
            let _ = self.receiver.receive(self.time, &packet);
        }

        if let Some(ack) = self.receiver.take_ack() {
            self.backward.send(ack);
        }

        self.receiver.update_view(self.time)
    }

    /// Ends the session: clears both peers and drops everything in flight.
    pub fn reset(&mut self) {
        log::debug!("session reset at {:.3}s", self.time);
        self.sender.reset();
        self.receiver.reset();
        self.forward.reset();
        self.backward.reset();
        self.time = 0.0;
    }
}
