use crate::config::PackerConfig;

/// Per-object send priority. Each accumulator grows by its weight every tick and is spent when
/// the object makes it into a packet.
#[derive(Debug, Clone)]
pub struct PriorityAccumulator {
    accumulators: Vec<f32>,
    base_weight: f32,
    player_weight: f32,
    interacting_weight: f32,
    player_index: Option<usize>,
}

impl PriorityAccumulator {
    pub fn new(num_objects: usize, config: &PackerConfig, player_index: Option<usize>) -> Self {
        Self {
            accumulators: vec![0.0; num_objects],
            base_weight: config.base_weight,
            player_weight: config.player_weight,
            interacting_weight: config.interacting_weight,
            player_index,
        }
    }

    pub fn len(&self) -> usize {
        self.accumulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulators.is_empty()
    }

    pub fn weight(&self, index: usize, interacting: bool) -> f32 {
        let mut weight = self.base_weight;
        if self.player_index == Some(index) {
            weight += self.player_weight;
        }
        if interacting {
            weight += self.interacting_weight;
        }
        weight
    }

    pub fn priority(&self, index: usize) -> f32 {
        self.accumulators.get(index).copied().unwrap_or(0.0)
    }

    pub fn accumulate(&mut self, dt: f32, interacting: impl Fn(usize) -> bool) {
        for index in 0..self.accumulators.len() {
            let weight = self.weight(index, interacting(index));
            self.accumulators[index] += dt * weight;
        }
    }

    /// Object indices by descending priority. Ties keep index order.
    pub fn order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.accumulators.len()).collect();
        order.sort_by(|&a, &b| self.accumulators[b].total_cmp(&self.accumulators[a]));
        order
    }

    /// Picks objects in priority order while they fit `budget_bits`. An object that does not fit
    /// is skipped. Returns the picked indices in priority order; nothing is reset until
    /// [`spend`](Self::spend).
    pub fn select(&self, budget_bits: usize, mut cost: impl FnMut(usize) -> usize) -> Vec<usize> {
        let mut remaining = budget_bits;
        let mut included = Vec::new();

        for index in self.order() {
            let bits = cost(index);
            if bits <= remaining {
                remaining -= bits;
                included.push(index);
            }
        }

        log::trace!(
            "packed {} of {} objects, {} bits unused",
            included.len(),
            self.accumulators.len(),
            remaining
        );
        included
    }

    /// Resets the accumulators of objects that went out in a packet.
    pub fn spend(&mut self, sent: &[usize]) {
        for &index in sent {
            if let Some(accumulator) = self.accumulators.get_mut(index) {
                *accumulator = 0.0;
            }
        }
    }

    pub fn reset(&mut self) {
        self.accumulators.fill(0.0);
    }
}
