use super::{InterpolationMode, curve};
use crate::config::{ProtocolConfig, ViewConfig};
use crate::sequence::{SequenceBuffer, sequence_difference};
use crate::state::{RigidBodyState, Snapshot};
use crate::view::ObjectUpdate;

/// Two buffered snapshots currently bracketing playback. Times are seconds of playback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationWindow {
    pub start_sequence: u16,
    pub start_time: f64,
    pub end_sequence: u16,
    pub end_time: f64,
    /// Window length used to scale Hermite tangents.
    pub step_size: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterpolationStats {
    pub snapshots_added: u64,
    pub updates: u64,
    pub underruns: u64,
    /// Times the window went stale and playback re-anchored.
    pub resyncs: u64,
}

#[derive(Debug)]
enum PlaybackState {
    Stopped,
    Running {
        start_time: f64,
        first_sequence: u16,
    },
}

/// Delays playback by `playout_delay` and interpolates between buffered snapshots. Snapshot
/// `s` is scheduled `(s - first) / send_rate` seconds after the first one arrived.
#[derive(Debug)]
pub struct InterpolationBuffer {
    snapshots: SequenceBuffer<Snapshot<RigidBodyState>>,
    state: PlaybackState,
    window: Option<InterpolationWindow>,
    playback_time: f64,
    send_rate: f64,
    playout_delay: f64,
    mode: InterpolationMode,
    extrapolation: f32,
    player_index: Option<usize>,
    view: ViewConfig,
    stats: InterpolationStats,
}

impl InterpolationBuffer {
    pub fn new(capacity: usize, protocol: &ProtocolConfig, view: &ViewConfig) -> Self {
        Self {
            snapshots: SequenceBuffer::new(capacity),
            state: PlaybackState::Stopped,
            window: None,
            playback_time: 0.0,
            send_rate: protocol.send_rate as f64,
            playout_delay: protocol.playout_delay,
            mode: protocol.interpolation,
            extrapolation: protocol.extrapolation,
            player_index: protocol.player_index,
            view: view.clone(),
            stats: InterpolationStats::default(),
        }
    }

    pub fn mode(&self) -> InterpolationMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: InterpolationMode) {
        self.mode = mode;
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, PlaybackState::Running { .. })
    }

    pub fn window(&self) -> Option<&InterpolationWindow> {
        self.window.as_ref()
    }

    /// Playback position of the last update, in seconds since playback began.
    pub fn playback_time(&self) -> f64 {
        self.playback_time
    }

    pub fn stats(&self) -> &InterpolationStats {
        &self.stats
    }

    /// Sequences searched ahead for the next window end.
    pub fn search_horizon(&self) -> u16 {
        ((self.playout_delay * self.send_rate).ceil() as u16).max(1)
    }

    pub fn snapshot(&self, sequence: u16) -> Option<&Snapshot<RigidBodyState>> {
        self.snapshots.find(sequence)
    }

    pub fn add_snapshot(&mut self, time: f64, sequence: u16, snapshot: Snapshot<RigidBodyState>) {
        if let PlaybackState::Stopped = self.state {
            self.state = PlaybackState::Running {
                start_time: time,
                first_sequence: sequence,
            };
        }
        self.snapshots.insert_value(sequence, snapshot);
        self.stats.snapshots_added += 1;
    }

    /// Interpolated state of every object at `time`, or `None` while playback has not started
    /// or no snapshot brackets the playback position.
    pub fn sample(&mut self, time: f64) -> Option<Vec<RigidBodyState>> {
        let PlaybackState::Running {
            start_time,
            first_sequence,
        } = self.state
        else {
            return None;
        };

        let playback = time - (start_time + self.playout_delay);
        if playback <= 0.0 {
            return None;
        }
        self.playback_time = playback;

        let frame = (playback * self.send_rate).floor();
        let frame_sequence = first_sequence.wrapping_add(frame as u64 as u16);
        let horizon = self.search_horizon();

        if let Some(window) = &self.window {
            if sequence_difference(frame_sequence, window.start_sequence) > horizon as i32 {
                log::debug!(
                    "interpolation window at {} went stale, resyncing at {}",
                    window.start_sequence,
                    frame_sequence
                );
                self.window = None;
                self.stats.resyncs += 1;
            }
        }

        if self.window.is_none() {
            // anchor on the newest snapshot at or before the playback frame
            let anchor = (0..=horizon).find(|&back| {
                self.snapshots
                    .contains(frame_sequence.wrapping_sub(back))
            });
            if let Some(back) = anchor {
                let anchor_time = (frame - back as f64) / self.send_rate;
                self.window = Some(InterpolationWindow {
                    start_sequence: frame_sequence.wrapping_sub(back),
                    start_time: anchor_time,
                    end_sequence: frame_sequence.wrapping_sub(back),
                    end_time: anchor_time,
                    step_size: 0.0,
                });
            }
        }

        let Some(mut window) = self.window else {
            self.underrun(playback);
            return None;
        };

        while playback >= window.end_time {
            let start_sequence = window.end_sequence;
            let start_time = window.end_time;
            let next = (1..=horizon).find(|&offset| {
                self.snapshots
                    .contains(start_sequence.wrapping_add(offset))
            });
            let Some(offset) = next else {
                break;
            };
            let step_size = offset as f64 / self.send_rate;
            window = InterpolationWindow {
                start_sequence,
                start_time,
                end_sequence: start_sequence.wrapping_add(offset),
                end_time: start_time + step_size,
                step_size,
            };
        }
        self.window = Some(window);

        if playback >= window.end_time {
            self.underrun(playback);
            return None;
        }

        let (Some(a), Some(b)) = (
            self.snapshots.find(window.start_sequence),
            self.snapshots.find(window.end_sequence),
        ) else {
            log::debug!(
                "window {}..{} was evicted, resyncing",
                window.start_sequence,
                window.end_sequence
            );
            self.window = None;
            self.underrun(playback);
            return None;
        };
        let span = window.end_time - window.start_time;
        let t = ((playback - window.start_time) / span).clamp(0.0, 1.0) as f32;
        let step_size = window.step_size as f32;

        let states = a
            .objects
            .iter()
            .zip(&b.objects)
            .map(|(a, b)| match self.mode {
                InterpolationMode::Linear => curve::linear(t, a, b),
                InterpolationMode::Hermite => curve::hermite_state(t, step_size, 0.0, a, b),
                InterpolationMode::HermiteWithExtrapolation => {
                    curve::hermite_state(t, step_size, self.extrapolation, a, b)
                }
            })
            .collect();

        self.stats.updates += 1;
        Some(states)
    }

    fn underrun(&mut self, playback: f64) {
        self.stats.underruns += 1;
        log::trace!("interpolation underrun at playback {playback:.3}s");
    }

    /// View updates for every object at `time`. `None` means hold the previous view.
    pub fn get_view_update(&mut self, time: f64) -> Option<Vec<ObjectUpdate>> {
        let states = self.sample(time)?;
        Some(
            states
                .iter()
                .enumerate()
                .map(|(index, state)| {
                    ObjectUpdate::from_state(index, state, self.player_index, &self.view)
                })
                .collect(),
        )
    }

    pub fn reset(&mut self) {
        self.snapshots.reset();
        self.state = PlaybackState::Stopped;
        self.window = None;
        self.playback_time = 0.0;
        self.stats = InterpolationStats::default();
    }
}
