use super::{SequenceBuffer, sequence_ambiguous, sequence_greater_than};

/// Sender-side sequence buffer with an acknowledgment cursor.
///
/// Sequences are allocated by the window itself. `ack` only ever moves forward and never past
/// the newest allocated sequence, so an acknowledged entry is always one the sender produced.
#[derive(Debug, Clone)]
pub struct SlidingWindow<T> {
    entries: SequenceBuffer<T>,
    next_sequence: u16,
    ack: Option<u16>,
    sent: bool,
}

impl<T> SlidingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: SequenceBuffer::new(capacity),
            next_sequence: 0,
            ack: None,
            sent: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// The sequence the next insert will be tagged with.
    pub fn next_sequence(&self) -> u16 {
        self.next_sequence
    }

    pub fn insert_value(&mut self, value: T) -> (u16, &mut T) {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.sent = true;
        (sequence, self.entries.insert_value(sequence, value))
    }

    pub fn get(&self, sequence: u16) -> Option<&T> {
        self.entries.find(sequence)
    }

    /// Records that the peer has received `sequence`. Stale or out-of-order acks are ignored.
    pub fn ack(&mut self, sequence: u16) {
        if !self.sent {
            return;
        }

        let newest = self.next_sequence.wrapping_sub(1);

        if let Some(current) = self.ack {
            if sequence_ambiguous(sequence, current) {
                debug_assert!(false, "ack {sequence} is half the sequence space from {current}");
                return;
            }
            if !sequence_greater_than(sequence, current) {
                return;
            }
        }

        self.ack = Some(if sequence_greater_than(sequence, newest) {
            newest
        } else {
            sequence
        });
    }

    pub fn get_ack(&self) -> Option<u16> {
        self.ack
    }

    /// The newest acknowledged entry, if it has not been overwritten since.
    pub fn acked_entry(&self) -> Option<(u16, &T)> {
        let ack = self.ack?;
        self.entries.find(ack).map(|entry| (ack, entry))
    }

    pub fn reset(&mut self) {
        self.entries.reset();
        self.next_sequence = 0;
        self.ack = None;
        self.sent = false;
    }
}

impl<T: Default> SlidingWindow<T> {
    pub fn insert(&mut self) -> (u16, &mut T) {
        self.insert_value(T::default())
    }
}
