#[derive(Debug, Clone)]
struct Entry<T> {
    sequence: u16,
    value: T,
}

/// Ring store keyed by a wrapping 16-bit sequence number.
///
/// A slot is only valid when its stored tag equals the requested sequence, which covers both
/// slots that were never written and slots overwritten once the sequence wrapped past them.
#[derive(Debug, Clone)]
pub struct SequenceBuffer<T> {
    entries: Vec<Option<Entry<T>>>,
    capacity: usize,
}

impl<T> SequenceBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "sequence buffer capacity must be non-zero");
        Self {
            entries: (0..capacity).map(|_| None).collect(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn index(&self, sequence: u16) -> usize {
        sequence as usize % self.capacity
    }

    /// Stores `value` at `sequence`, unconditionally replacing whatever occupied the slot.
    pub fn insert_value(&mut self, sequence: u16, value: T) -> &mut T {
        let index = self.index(sequence);
        &mut self.entries[index].insert(Entry { sequence, value }).value
    }

    pub fn find(&self, sequence: u16) -> Option<&T> {
        self.entries[self.index(sequence)]
            .as_ref()
            .filter(|entry| entry.sequence == sequence)
            .map(|entry| &entry.value)
    }

    pub fn find_mut(&mut self, sequence: u16) -> Option<&mut T> {
        let index = self.index(sequence);
        self.entries[index]
            .as_mut()
            .filter(|entry| entry.sequence == sequence)
            .map(|entry| &mut entry.value)
    }

    pub fn contains(&self, sequence: u16) -> bool {
        self.find(sequence).is_some()
    }

    pub fn remove(&mut self, sequence: u16) -> Option<T> {
        let index = self.index(sequence);
        if self.entries[index]
            .as_ref()
            .is_some_and(|entry| entry.sequence == sequence)
        {
            self.entries[index].take().map(|entry| entry.value)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        for slot in &mut self.entries {
            *slot = None;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Default> SequenceBuffer<T> {
    /// Claims the slot for `sequence` and hands back a freshly defaulted entry to fill in.
    pub fn insert(&mut self, sequence: u16) -> &mut T {
        self.insert_value(sequence, T::default())
    }
}
