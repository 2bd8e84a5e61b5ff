use crate::codec::{AckPacket, Baseline, CodecError, DeltaMode, PacketHeader, SnapshotCodec, SnapshotFrame};
use crate::config::{ConfigError, SyncConfig};
use crate::metrics::{MetricsSink, NullMetrics};
use crate::priority::PriorityAccumulator;
use crate::sequence::{SlidingWindow, sequence_greater_than};
use crate::state::{ActiveObject, QuantizedSnapshot, RigidBodyState, Snapshot};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    pub packets_sent: u64,
    pub initial_packets: u64,
    /// Packets that came out over budget and were replaced by an empty update.
    pub packets_emptied: u64,
    pub objects_sent: u64,
    pub bytes_sent: u64,
    pub acks_received: u64,
    pub acks_discarded: u64,
}

/// Snapshot the receiver reconstructs from a delta packet, with the sequence of the packet
/// each object's value came from.
#[derive(Debug, Clone)]
struct SentSnapshot {
    snapshot: QuantizedSnapshot,
    sources: Vec<Option<u16>>,
}

/// Sending peer: holds the live state, decides what goes into each packet and which acked
/// snapshot it is encoded against.
#[derive(Debug)]
pub struct Sender<M: MetricsSink = NullMetrics> {
    codec: SnapshotCodec,
    mode: DeltaMode,
    /// Absolute packets leave `None`, so they are never used as a baseline.
    window: SlidingWindow<Option<SentSnapshot>>,
    /// Newest packet that carried each object.
    last_update: Vec<Option<u16>>,
    priority: PriorityAccumulator,
    live: Snapshot<RigidBodyState>,
    initial_state: Snapshot<RigidBodyState>,
    initial: QuantizedSnapshot,
    send_interval: f64,
    send_accumulator: f64,
    max_packet_bytes: usize,
    metrics: M,
    stats: SenderStats,
}

impl Sender<NullMetrics> {
    pub fn new(config: &SyncConfig, initial: Snapshot<RigidBodyState>) -> Result<Self, ConfigError> {
        Self::with_metrics(config, initial, NullMetrics)
    }
}

impl<M: MetricsSink> Sender<M> {
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
        let send_interval = config.protocol.send_interval();
        Ok(Self {
            mode: DeltaMode::default(),
            window: SlidingWindow::new(config.buffers.window_size),
            last_update: vec![None; num_objects],
            priority: PriorityAccumulator::new(
                num_objects,
                &config.packer,
                config.protocol.player_index,
            ),
            live: initial.clone(),
            initial_state: initial,
            initial: quantized,
            send_interval,
            // first update sends immediately
            send_accumulator: send_interval,
            max_packet_bytes: config.packer.max_packet_bytes,
            codec,
            metrics,
            stats: SenderStats::default(),
        })
    }

    pub fn mode(&self) -> DeltaMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DeltaMode) {
        if mode != self.mode {
            log::debug!("sender mode {} -> {}", self.mode, mode);
            self.mode = mode;
        }
    }

    pub fn codec(&self) -> &SnapshotCodec {
        &self.codec
    }

    pub fn live(&self) -> &Snapshot<RigidBodyState> {
        &self.live
    }

    pub fn priority(&self) -> &PriorityAccumulator {
        &self.priority
    }

    pub fn ack(&self) -> Option<u16> {
        self.window.get_ack()
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut M {
        &mut self.metrics
    }

    /// Folds the activation feed into the live state. Unreported objects keep their last state.
    pub fn apply_feed(&mut self, active: &[ActiveObject]) {
        for object in active {
            match self.live.objects.get_mut(object.index) {
                Some(state) => *state = object.state,
                None => log::warn!("ignoring feed for unknown object {}", object.index),
            }
        }
    }

    /// Advances one tick. Returns an encoded packet when a send is due.
    pub fn update(&mut self, dt: f64, active: &[ActiveObject]) -> Option<Vec<u8>> {
        self.apply_feed(active);

        let live = &self.live;
        self.priority
            .accumulate(dt as f32, |index| live.objects[index].interacting);

        self.send_accumulator += dt;
        if self.send_accumulator < self.send_interval {
            return None;
        }
        self.send_accumulator %= self.send_interval;

        self.write_snapshot()
    }

    /// Builds the next packet from the live state, regardless of the send clock.
    pub fn write_snapshot(&mut self) -> Option<Vec<u8>> {
        let sequence = self.window.next_sequence();
        let mode = self.mode;
        let current = self.codec.quantizer().quantize_snapshot(&self.live);
        let num_objects = current.len();

        let (baseline, base, sources) = match self.window.acked_entry() {
            Some((ack, Some(sent))) if mode.is_delta() => (
                Baseline::Sequence(ack),
                sent.snapshot.clone(),
                sent.sources.clone(),
            ),
            acked => {
                if mode.is_delta() && acked.is_none() {
                    if let Some(ack) = self.window.get_ack() {
                        log::debug!("baseline {ack} left the window, encoding against initial");
                    }
                }
                (Baseline::Initial, self.initial.clone(), vec![None; num_objects])
            }
        };

        // an object needs sending when it differs from the baseline, or when a packet newer
        // than the baseline's copy may have shown the receiver something else
        let pending: Vec<bool> = if mode.is_delta() {
            (0..num_objects)
                .map(|index| {
                    current.objects[index] != base.objects[index]
                        || sent_since(self.last_update[index], sources[index])
                })
                .collect()
        } else {
            vec![true; num_objects]
        };

        let header = PacketHeader::new(sequence, mode, baseline);
        let budget = (self.max_packet_bytes * 8)
            .saturating_sub(SnapshotCodec::header_bits(&header) + self.codec.framing_bits(mode));

        let codec = &self.codec;
        let mut included = self.priority.select(budget, |index| {
            if pending[index] {
                codec.object_bits(mode, &current.objects[index], &base.objects[index])
            } else {
                0
            }
        });
        included.sort_unstable();
        let mut sent: Vec<usize> = included.iter().copied().filter(|&i| pending[i]).collect();

        let frame = self.build_frame(mode, &sent, &current);
        let bytes = match self.codec.encode(&header, &frame, Some(&base)) {
            Ok(bytes) if bytes.len() <= self.max_packet_bytes => bytes,
            result => {
                log::warn!(
                    "snapshot {sequence} did not fit {} bytes ({}), sending an empty update",
                    self.max_packet_bytes,
                    describe(&result)
                );
                self.stats.packets_emptied += 1;
                included.clear();
                sent.clear();
                let frame = self.build_frame(mode, &sent, &current);
                match self.codec.encode(&header, &frame, Some(&base)) {
                    Ok(bytes) if bytes.len() <= self.max_packet_bytes => bytes,
                    _ => return None,
                }
            }
        };

        self.priority.spend(&included);
        for &index in &sent {
            self.last_update[index] = Some(sequence);
            if mode.is_delta() && current.objects[index] != base.objects[index] {
                self.metrics
                    .object_delta(&current.objects[index], &base.objects[index]);
            }
        }

        let stored = mode.is_delta().then(|| {
            let mut snapshot = base;
            let mut sources = sources;
            for &index in &sent {
                snapshot.objects[index] = current.objects[index];
                sources[index] = Some(sequence);
            }
            SentSnapshot { snapshot, sources }
        });
        self.window.insert_value(stored);

        if baseline == Baseline::Initial {
            self.stats.initial_packets += 1;
        }
        self.stats.packets_sent += 1;
        self.stats.objects_sent += sent.len() as u64;
        self.stats.bytes_sent += bytes.len() as u64;
        self.metrics.packet_sent(mode, bytes.len() * 8, sent.len());
        log::trace!(
            "snapshot {sequence}: {mode}, {} objects, {} bytes, base {baseline:?}",
            sent.len(),
            bytes.len()
        );
        Some(bytes)
    }

    fn build_frame(&self, mode: DeltaMode, sent: &[usize], current: &QuantizedSnapshot) -> SnapshotFrame {
        match mode {
            DeltaMode::Uncompressed => SnapshotFrame::Uncompressed(
                sent.iter()
                    .map(|&index| (index, self.live.objects[index]))
                    .collect(),
            ),
            DeltaMode::QuantizedAbsolute => SnapshotFrame::Absolute(
                sent.iter()
                    .map(|&index| (index, current.objects[index]))
                    .collect(),
            ),
            _ => SnapshotFrame::Delta(
                sent.iter()
                    .map(|&index| (index, current.objects[index]))
                    .collect(),
            ),
        }
    }

    pub fn process_ack(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        match AckPacket::decode(bytes) {
            Ok(packet) => {
                self.window.ack(packet.ack);
                self.stats.acks_received += 1;
                Ok(())
            }
            Err(error) => {
                log::debug!("discarding ack: {error}");
                self.stats.acks_discarded += 1;
                Err(error)
            }
        }
    }

    pub fn reset(&mut self) {
        log::debug!("sender reset");
        self.window.reset();
        self.last_update.fill(None);
        self.priority.reset();
        self.live = self.initial_state.clone();
        self.send_accumulator = self.send_interval;
        self.stats = SenderStats::default();
    }
}

fn sent_since(last_update: Option<u16>, source: Option<u16>) -> bool {
    match (last_update, source) {
        (Some(last), Some(source)) => sequence_greater_than(last, source),
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn describe(result: &Result<Vec<u8>, CodecError>) -> String {
    match result {
        Ok(bytes) => format!("{} bytes", bytes.len()),
        Err(error) => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SnapshotPacket;
    use glam::Vec3;

    fn config(objects: usize) -> SyncConfig {
        let mut config = SyncConfig::default();
        config.protocol.num_objects = objects;
        config
    }

    fn grid(objects: usize) -> Snapshot<RigidBodyState> {
        Snapshot::new(
            (0..objects)
                .map(|i| RigidBodyState::at_position(Vec3::new(i as f32, 0.0, 1.0)))
                .collect(),
        )
    }

    fn moving(objects: usize, t: f32) -> Vec<ActiveObject> {
        (0..objects)
            .map(|i| {
                let mut state = RigidBodyState::at_position(Vec3::new(i as f32 + t, 0.0, 1.0));
                state.linear_velocity = Vec3::X;
                ActiveObject::new(i, state)
            })
            .collect()
    }

    fn decode(sender: &Sender, bytes: &[u8], base: &QuantizedSnapshot) -> SnapshotPacket {
        sender.codec().decode(bytes, |_| Some(base)).unwrap()
    }

    #[test]
    fn first_update_sends_initial_packet() {
        let mut sender = Sender::new(&config(8), grid(8)).unwrap();
        let bytes = sender.update(1.0 / 60.0, &[]).unwrap();
        let initial = sender.codec().quantizer().quantize_snapshot(&grid(8));
        let packet = decode(&sender, &bytes, &initial);
        assert_eq!(packet.header.sequence, 0);
        assert_eq!(packet.header.baseline, Baseline::Initial);
        assert_eq!(sender.stats().initial_packets, 1);
    }

    #[test]
    fn sends_at_configured_rate() {
        let mut config = config(4);
        config.protocol.send_rate = 30.0;
        let mut sender = Sender::new(&config, grid(4)).unwrap();
        let sent = (0..60)
            .filter(|_| sender.update(1.0 / 60.0, &[]).is_some())
            .count();
        assert!((29..=31).contains(&sent), "sent {sent}");
    }

    #[test]
    fn acked_snapshot_becomes_baseline() {
        let mut sender = Sender::new(&config(8), grid(8)).unwrap();
        sender.write_snapshot().unwrap();
        sender.process_ack(&AckPacket::new(0).encode()).unwrap();

        sender.apply_feed(&moving(8, 0.5));
        let bytes = sender.write_snapshot().unwrap();
        let initial = sender.codec().quantizer().quantize_snapshot(&grid(8));
        let packet = decode(&sender, &bytes, &initial);
        assert_eq!(packet.header.baseline, Baseline::Sequence(0));
    }

    #[test]
    fn absolute_packets_are_never_baselines() {
        let mut sender = Sender::new(&config(8), grid(8)).unwrap();
        sender.set_mode(DeltaMode::QuantizedAbsolute);
        sender.write_snapshot().unwrap();
        sender.process_ack(&AckPacket::new(0).encode()).unwrap();

        sender.set_mode(DeltaMode::RelativeIndex);
        let bytes = sender.write_snapshot().unwrap();
        let (header, _) = peek_header(&bytes);
        assert_eq!(header.baseline, Baseline::Initial);
    }

    fn peek_header(bytes: &[u8]) -> (PacketHeader, usize) {
        let mut reader = crate::bitstream::BitReader::new(bytes);
        let header = PacketHeader::read(&mut reader).unwrap();
        (header, reader.bits_read())
    }

    #[test]
    fn packets_stay_within_budget() {
        let mut config = config(200);
        config.packer.max_packet_bytes = 256;
        let initial = grid(200);

        for mode in DeltaMode::ALL {
            let mut sender = Sender::new(&config, initial.clone()).unwrap();
            sender.set_mode(mode);
            for tick in 0..20 {
                sender.apply_feed(&moving(200, tick as f32 * 0.37));
                let bytes = sender.write_snapshot().unwrap();
                assert!(bytes.len() <= 256, "{mode}: {} bytes", bytes.len());
                if tick % 3 == 0 {
                    sender
                        .process_ack(&AckPacket::new(tick as u16).encode())
                        .unwrap();
                }
            }
            assert_eq!(sender.stats().packets_emptied, 0, "{mode}");
            assert!(sender.stats().objects_sent > 0, "{mode}");
        }
    }

    #[test]
    fn unknown_feed_index_is_ignored() {
        let mut sender = Sender::new(&config(2), grid(2)).unwrap();
        sender.apply_feed(&[ActiveObject::new(7, RigidBodyState::default())]);
        assert_eq!(sender.live(), &grid(2));
    }

    #[test]
    fn reset_restarts_sequences() {
        let mut sender = Sender::new(&config(4), grid(4)).unwrap();
        for _ in 0..3 {
            sender.write_snapshot().unwrap();
        }
        sender.process_ack(&AckPacket::new(2).encode()).unwrap();
        sender.reset();

        assert_eq!(sender.ack(), None);
        let bytes = sender.write_snapshot().unwrap();
        let (header, _) = peek_header(&bytes);
        assert_eq!(header.sequence, 0);
        assert_eq!(header.baseline, Baseline::Initial);
    }

    #[test]
    fn only_sent_objects_lose_priority() {
        let mut config = config(60);
        config.packer.max_packet_bytes = 40;
        let mut sender = Sender::new(&config, grid(60)).unwrap();
        sender.set_mode(DeltaMode::RelativePosition);

        sender.update(1.0 / 60.0, &moving(60, 0.5)).unwrap();
        let sent = sender.stats().objects_sent as usize;
        assert!(sent > 0 && sent < 60, "sent {sent}");

        let spent = (0..60)
            .filter(|&index| sender.priority().priority(index) == 0.0)
            .count();
        assert_eq!(spent, sent);
    }

    #[test]
    fn emptied_packet_keeps_priorities() {
        let mut sender = Sender::new(&config(4), grid(4)).unwrap();
        sender.set_mode(DeltaMode::Uncompressed);

        let broken = RigidBodyState::at_position(Vec3::new(f32::NAN, 0.0, 1.0));
        sender.update(1.0, &[ActiveObject::new(2, broken)]).unwrap();

        assert_eq!(sender.stats().packets_emptied, 1);
        assert_eq!(sender.stats().objects_sent, 0);
        for index in 0..4 {
            assert!(sender.priority().priority(index) > 0.0, "object {index}");
        }
    }

    #[test]
    fn object_back_at_baseline_value_is_resent() {
        let mut sender = Sender::new(&config(4), grid(4)).unwrap();
        sender.set_mode(DeltaMode::RelativeIndex);
        let at = |x: f32| [ActiveObject::new(1, RigidBodyState::at_position(Vec3::new(x, 0.0, 1.0)))];

        sender.apply_feed(&at(3.0));
        sender.write_snapshot().unwrap();
        sender.process_ack(&AckPacket::new(0).encode()).unwrap();

        // snapshot 1 carries a different value and is never acked
        sender.apply_feed(&at(5.0));
        sender.write_snapshot().unwrap();

        sender.apply_feed(&at(3.0));
        let bytes = sender.write_snapshot().unwrap();

        let mut acked = grid(4);
        acked.objects[1] = RigidBodyState::at_position(Vec3::new(3.0, 0.0, 1.0));
        let base = sender.codec().quantizer().quantize_snapshot(&acked);
        let packet = decode(&sender, &bytes, &base);
        assert_eq!(packet.header.baseline, Baseline::Sequence(0));
        match packet.frame {
            SnapshotFrame::Delta(updates) => {
                assert_eq!(updates, vec![(1, base.objects[1])]);
            }
            frame => panic!("unexpected frame {frame:?}"),
        }
    }

    #[test]
    fn unchanged_objects_stay_out_of_delta_packets() {
        let mut sender = Sender::new(&config(4), grid(4)).unwrap();
        sender.set_mode(DeltaMode::RelativeIndex);
        sender.write_snapshot().unwrap();
        sender.process_ack(&AckPacket::new(0).encode()).unwrap();

        let bytes = sender.write_snapshot().unwrap();
        let initial = sender.codec().quantizer().quantize_snapshot(&grid(4));
        match decode(&sender, &bytes, &initial).frame {
            SnapshotFrame::Delta(updates) => assert!(updates.is_empty()),
            frame => panic!("unexpected frame {frame:?}"),
        }
    }

    #[test]
    fn rejects_mismatched_initial_snapshot() {
        assert!(Sender::new(&config(4), grid(3)).is_err());
    }
}
