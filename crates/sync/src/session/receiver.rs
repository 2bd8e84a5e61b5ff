use crate::codec::{AckPacket, Baseline, CodecError, SnapshotCodec, SnapshotFrame, apply_updates};
use crate::config::{ConfigError, SyncConfig};
use crate::interpolation::InterpolationBuffer;
use crate::metrics::{MetricsSink, NullMetrics};
use crate::sequence::{SequenceBuffer, sequence_greater_than};
use crate::state::{QuantizedSnapshot, RigidBodyState, Snapshot};
use crate::view::ObjectUpdate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub packets_received: u64,
    pub packets_decoded: u64,
    pub packets_discarded: u64,
    pub acks_sent: u64,
}

/// Receiving peer: decodes packets, keeps the snapshots later deltas may reference, and feeds
/// the interpolation buffer.
#[derive(Debug)]
pub struct Receiver<M: MetricsSink = NullMetrics> {
    codec: SnapshotCodec,
    received: SequenceBuffer<QuantizedSnapshot>,
    initial: QuantizedSnapshot,
    initial_state: Snapshot<RigidBodyState>,
    /// Newest known state per object and the sequence it came from.
    latest: Vec<RigidBodyState>,
    latest_sequence: Vec<Option<u16>>,
    interpolation: InterpolationBuffer,
    pending_ack: Option<u16>,
    view: Vec<ObjectUpdate>,
    metrics: M,
    stats: ReceiverStats,
}

impl Receiver<NullMetrics> {
    pub fn new(config: &SyncConfig, initial: Snapshot<RigidBodyState>) -> Result<Self, ConfigError> {
        Self::with_metrics(config, initial, NullMetrics)
    }
}

impl<M: MetricsSink> Receiver<M> {
    pub fn with_metrics(
        config: &SyncConfig,
        initial: Snapshot<RigidBodyState>,
        metrics: M,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let num_objects = config.protocol.num_objects;
        if initial.len() != num_objects {
            return Err(ConfigError::Invalid(format!(
                "initial snapshot holds {} objects, expected {num_objects}",
                initial.len()
            )));
        }

        let codec = SnapshotCodec::new(config);
        let quantized = codec.quantizer().quantize_snapshot(&initial);
        Ok(Self {
            received: SequenceBuffer::new(config.buffers.receive_size),
            initial: quantized,
            latest: initial.objects.clone(),
            latest_sequence: vec![None; num_objects],
            initial_state: initial,
            interpolation: InterpolationBuffer::new(
                config.buffers.interpolation_size,
                &config.protocol,
                &config.view,
            ),
            pending_ack: None,
            view: Vec::new(),
            codec,
            metrics,
            stats: ReceiverStats::default(),
        })
    }

    pub fn interpolation(&self) -> &InterpolationBuffer {
        &self.interpolation
    }

    pub fn interpolation_mut(&mut self) -> &mut InterpolationBuffer {
        &mut self.interpolation
    }

    pub fn latest(&self) -> &[RigidBodyState] {
        &self.latest
    }

    /// Snapshot decoded from delta packet `sequence`, while it is still buffered.
    pub fn snapshot(&self, sequence: u16) -> Option<&QuantizedSnapshot> {
        self.received.find(sequence)
    }

    pub fn view(&self) -> &[ObjectUpdate] {
        &self.view
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    /// Decodes one packet that arrived at `time`. A packet that fails to decode is discarded
    /// as if it had been lost.
    pub fn receive(&mut self, time: f64, bytes: &[u8]) -> Result<u16, CodecError> {
        self.stats.packets_received += 1;

        let initial = &self.initial;
        let received = &self.received;
        let packet = match self.codec.decode(bytes, |baseline| match baseline {
            Baseline::Initial => Some(initial),
            Baseline::Sequence(sequence) => received.find(sequence),
        }) {
            Ok(packet) => packet,
            Err(error) => {
                log::debug!("discarding {} byte packet: {error}", bytes.len());
                self.stats.packets_discarded += 1;
                self.metrics.packet_discarded(&error);
                return Err(error);
            }
        };

        let sequence = packet.header.sequence;
        let snapshot = match packet.frame {
            SnapshotFrame::Uncompressed(objects) => {
                for (index, state) in objects {
                    self.merge(sequence, index, state);
                }
                Snapshot::new(self.latest.clone())
            }
            SnapshotFrame::Absolute(objects) => {
                for (index, state) in objects {
                    let state = self.codec.quantizer().dequantize_state(&state);
                    self.merge(sequence, index, state);
                }
                Snapshot::new(self.latest.clone())
            }
            SnapshotFrame::Delta(updates) => {
                let baseline = packet.header.baseline;
                let reconstructed = self
                    .baseline(baseline)
                    .map(|base| apply_updates(base, &updates))
                    .ok_or(CodecError::MissingBaseline(baseline))?;
                // objects left out of the packet keep whatever newer state is already known
                for (index, state) in updates {
                    let state = self.codec.quantizer().dequantize_state(&state);
                    self.merge(sequence, index, state);
                }
                self.received.insert_value(sequence, reconstructed);
                Snapshot::new(self.latest.clone())
            }
        };

        self.interpolation.add_snapshot(time, sequence, snapshot);
        self.stats.packets_decoded += 1;

        if self
            .pending_ack
            .is_none_or(|ack| sequence_greater_than(sequence, ack))
        {
            self.pending_ack = Some(sequence);
        }
        Ok(sequence)
    }

    fn baseline(&self, baseline: Baseline) -> Option<&QuantizedSnapshot> {
        match baseline {
            Baseline::Initial => Some(&self.initial),
            Baseline::Sequence(sequence) => self.received.find(sequence),
        }
    }

    fn merge(&mut self, sequence: u16, index: usize, state: RigidBodyState) {
        let newer = self.latest_sequence[index].is_none_or(|known| !sequence_greater_than(known, sequence));
        if newer {
            self.latest[index] = state;
            self.latest_sequence[index] = Some(sequence);
        }
    }

    /// Acknowledgment for the newest packet decoded since the last call.
    pub fn take_ack(&mut self) -> Option<Vec<u8>> {
        let ack = self.pending_ack.take()?;
        self.stats.acks_sent += 1;
        Some(AckPacket::new(ack).encode())
    }

    /// Refreshes the view for render time `time`. On underrun the previous view is kept.
    pub fn update_view(&mut self, time: f64) -> &[ObjectUpdate] {
        if let Some(view) = self.interpolation.get_view_update(time) {
            self.view = view;
        }
        &self.view
    }

    pub fn reset(&mut self) {
        log::debug!("receiver reset");
        self.received.reset();
        self.latest = self.initial_state.objects.clone();
        self.latest_sequence.fill(None);
        self.interpolation.reset();
        self.pending_ack = None;
        self.view.clear();
        self.stats = ReceiverStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DeltaMode, PacketHeader, delta_updates};
    use crate::metrics::DeltaStats;
    use glam::Vec3;

    const OBJECTS: usize = 4;

    fn config() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.protocol.num_objects = OBJECTS;
        config
    }

    fn initial() -> Snapshot<RigidBodyState> {
        Snapshot::new(
            (0..OBJECTS)
                .map(|i| RigidBodyState::at_position(Vec3::new(i as f32, 0.0, 1.0)))
                .collect(),
        )
    }

    fn absolute(receiver: &Receiver, sequence: u16, index: usize, x: f32) -> Vec<u8> {
        let quantizer = receiver.codec.quantizer();
        let state = quantizer.quantize_state(&RigidBodyState::at_position(Vec3::new(x, 0.0, 1.0)));
        receiver
            .codec
            .encode(
                &PacketHeader::new(sequence, DeltaMode::QuantizedAbsolute, Baseline::Initial),
                &SnapshotFrame::Absolute(vec![(index, state)]),
                None,
            )
            .unwrap()
    }

    #[test]
    fn older_absolute_update_does_not_overwrite() {
        let mut receiver = Receiver::new(&config(), initial()).unwrap();
        let newer = absolute(&receiver, 5, 1, 10.0);
        let older = absolute(&receiver, 4, 1, 20.0);

        receiver.receive(0.0, &newer).unwrap();
        receiver.receive(0.0, &older).unwrap();

        assert_eq!(receiver.latest()[1].position.x, 10.0);
        assert_eq!(receiver.latest()[2].position.x, 2.0);
    }

    #[test]
    fn acks_newest_decoded_sequence_once() {
        let mut receiver = Receiver::new(&config(), initial()).unwrap();
        for sequence in [3, 7, 5] {
            let packet = absolute(&receiver, sequence, 0, 1.0);
            receiver.receive(0.0, &packet).unwrap();
        }

        let ack = receiver.take_ack().unwrap();
        assert_eq!(AckPacket::decode(&ack).unwrap().ack, 7);
        assert!(receiver.take_ack().is_none());
    }

    #[test]
    fn delta_against_unknown_baseline_is_discarded() {
        let mut receiver = Receiver::with_metrics(&config(), initial(), DeltaStats::new()).unwrap();
        let base = receiver.initial.clone();
        let bytes = receiver
            .codec
            .encode(
                &PacketHeader::new(9, DeltaMode::NotChanged, Baseline::Sequence(8)),
                &SnapshotFrame::Delta(Vec::new()),
                Some(&base),
            )
            .unwrap();

        assert_eq!(
            receiver.receive(0.0, &bytes),
            Err(CodecError::MissingBaseline(Baseline::Sequence(8)))
        );
        assert_eq!(receiver.stats().packets_discarded, 1);
        assert_eq!(receiver.metrics().discarded, 1);
        assert!(receiver.take_ack().is_none());
    }

    #[test]
    fn delta_snapshots_become_baselines() {
        let mut receiver = Receiver::new(&config(), initial()).unwrap();
        let base = receiver.initial.clone();
        let mut moved = base.clone();
        moved.objects[2].position.x += 40;

        let first = receiver
            .codec
            .encode(
                &PacketHeader::new(0, DeltaMode::RelativePosition, Baseline::Initial),
                &SnapshotFrame::Delta(delta_updates(&moved, &base)),
                Some(&base),
            )
            .unwrap();
        receiver.receive(0.0, &first).unwrap();
        assert_eq!(receiver.snapshot(0), Some(&moved));

        let second = receiver
            .codec
            .encode(
                &PacketHeader::new(1, DeltaMode::RelativePosition, Baseline::Sequence(0)),
                &SnapshotFrame::Delta(Vec::new()),
                Some(&moved),
            )
            .unwrap();
        assert_eq!(receiver.receive(0.0, &second), Ok(1));
        assert_eq!(receiver.snapshot(1), Some(&moved));
    }

    #[test]
    fn delta_keeps_newer_state_of_objects_it_skips() {
        let mut receiver = Receiver::new(&config(), initial()).unwrap();
        let newer = absolute(&receiver, 6, 1, 12.0);
        receiver.receive(0.0, &newer).unwrap();

        // an older delta against the initial snapshot that only carries object 3
        let base = receiver.initial.clone();
        let mut moved = base.clone();
        moved.objects[3].position.x += 512;
        let bytes = receiver
            .codec
            .encode(
                &PacketHeader::new(7, DeltaMode::RelativeIndex, Baseline::Initial),
                &SnapshotFrame::Delta(delta_updates(&moved, &base)),
                Some(&base),
            )
            .unwrap();
        receiver.receive(0.0, &bytes).unwrap();

        assert_eq!(receiver.latest()[1].position.x, 12.0);
        assert_eq!(receiver.latest()[3].position.x, 4.0);
        // the stored baseline is what the sender reconstructs, not the merged view
        assert_eq!(receiver.snapshot(7), Some(&moved));
        let fed = receiver.interpolation().snapshot(7).unwrap();
        assert_eq!(fed.objects[1].position.x, 12.0);
    }

    #[test]
    fn view_holds_through_underrun() {
        let mut receiver = Receiver::new(&config(), initial()).unwrap();
        for sequence in 0..3u16 {
            let packet = absolute(&receiver, sequence, 0, sequence as f32);
            receiver
                .receive(sequence as f64 / 60.0, &packet)
                .unwrap();
        }

        let view = receiver.update_view(0.1 + 0.5 / 60.0).to_vec();
        assert_eq!(view.len(), OBJECTS);
        // far past the last snapshot: the view freezes
        assert_eq!(receiver.update_view(5.0), view.as_slice());
    }
}
