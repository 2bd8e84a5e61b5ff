//! Optional research instrumentation. Nothing here feeds back into the protocol.

use std::collections::BTreeMap;

use crate::codec::{CodecError, DeltaMode};
use crate::state::QuantizedRigidBodyState;

/// Observer hooks for the sender and receiver. Every method defaults to a no-op.
pub trait MetricsSink {
    fn packet_sent(&mut self, _mode: DeltaMode, _bits: usize, _objects: usize) {}

    /// A changed object written against `base`.
    fn object_delta(&mut self, _state: &QuantizedRigidBodyState, _base: &QuantizedRigidBodyState) {}

    fn packet_discarded(&mut self, _error: &CodecError) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullMetrics;

impl MetricsSink for NullMetrics {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Histogram {
    buckets: BTreeMap<i32, u64>,
    samples: u64,
}

impl Histogram {
    pub fn record(&mut self, value: i32) {
        *self.buckets.entry(value).or_default() += 1;
        self.samples += 1;
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn count(&self, value: i32) -> u64 {
        self.buckets.get(&value).copied().unwrap_or(0)
    }

    /// Fraction of samples with `|value| <= bound`.
    pub fn fraction_within(&self, bound: i32) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        let within: u64 = self.buckets.range(-bound..=bound).map(|(_, count)| count).sum();
        within as f64 / self.samples as f64
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, u64)> + '_ {
        self.buckets.iter().map(|(value, count)| (*value, *count))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeTotals {
    pub packets: u64,
    pub bits: u64,
    pub objects: u64,
}

/// Histograms of per-field deltas of changed objects, plus per-mode packet totals. Useful for
/// tuning the relative-coding bounds.
#[derive(Debug, Clone, Default)]
pub struct DeltaStats {
    pub position: [Histogram; 3],
    /// Component deltas of orientations that kept the same dropped component.
    pub orientation: [Histogram; 3],
    pub largest_changed: u64,
    pub modes: [ModeTotals; DeltaMode::ALL.len()],
    pub discarded: u64,
}

impl DeltaStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self, mode: DeltaMode) -> &ModeTotals {
        &self.modes[mode as usize]
    }

    pub fn average_bits(&self, mode: DeltaMode) -> f64 {
        let totals = self.mode(mode);
        if totals.packets == 0 {
            return 0.0;
        }
        totals.bits as f64 / totals.packets as f64
    }
}

impl MetricsSink for DeltaStats {
    fn packet_sent(&mut self, mode: DeltaMode, bits: usize, objects: usize) {
        let totals = &mut self.modes[mode as usize];
        totals.packets += 1;
        totals.bits += bits as u64;
        totals.objects += objects as u64;
    }

    fn object_delta(&mut self, state: &QuantizedRigidBodyState, base: &QuantizedRigidBodyState) {
        let offset = state.position - base.position;
        for (axis, histogram) in self.position.iter_mut().enumerate() {
            histogram.record(offset[axis]);
        }

        if state.orientation.largest != base.orientation.largest {
            self.largest_changed += 1;
            return;
        }
        let current = state.orientation.components();
        let previous = base.orientation.components();
        for (i, histogram) in self.orientation.iter_mut().enumerate() {
            histogram.record(current[i] as i32 - previous[i] as i32);
        }
    }

    fn packet_discarded(&mut self, _error: &CodecError) {
        self.discarded += 1;
    }
}
