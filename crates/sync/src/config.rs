use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::interpolation::InterpolationMode;

pub const DEFAULT_SEND_RATE: f32 = 60.0;
pub const DEFAULT_MAX_PACKET_BYTES: usize = 1200;
pub const MAX_ORIENTATION_BITS: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub quantization: QuantizationConfig,
    pub codec: CodecConfig,
    pub link: LinkConfig,
    pub protocol: ProtocolConfig,
    pub packer: PackerConfig,
    pub buffers: BufferConfig,
    pub view: ViewConfig,
}

impl SyncConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.quantization.validate()?;
        self.codec.validate()?;
        self.link.validate()?;
        self.protocol.validate()?;
        self.packer.validate()?;
        self.buffers.validate()?;

        // the largest header plus one flag per object must fit an empty update
        let framing_bits = 16 + 3 + 1 + 16 + 1 + self.protocol.num_objects;
        if self.packer.max_packet_bytes * 8 < framing_bits {
            return Err(invalid(format!(
                "max_packet_bytes {} cannot hold an empty update for {} objects",
                self.packer.max_packet_bytes, self.protocol.num_objects
            )));
        }

        // the interpolation buffer must outlast the search horizon plus the window end
        let delay = self.protocol.playout_delay * self.protocol.send_rate as f64;
        let horizon = (delay.ceil() as usize).max(1);
        if self.buffers.interpolation_size <= horizon + 1 {
            return Err(invalid(format!(
                "interpolation_size {} must exceed {} snapshots of playout delay",
                self.buffers.interpolation_size,
                horizon + 1
            )));
        }

        // every acked snapshot the sender may encode against must still be held by the receiver
        if self.buffers.receive_size < self.buffers.window_size {
            return Err(invalid(format!(
                "receive_size {} is smaller than window_size {}",
                self.buffers.receive_size, self.buffers.window_size
            )));
        }

        if let Some(player) = self.protocol.player_index {
            if player >= self.protocol.num_objects {
                return Err(invalid(format!(
                    "player_index {player} is not below num_objects {}",
                    self.protocol.num_objects
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizationConfig {
    pub position_min: Vec3,
    pub position_max: Vec3,
    /// Integer units per metre.
    pub position_resolution: f32,
    pub max_linear_velocity: f32,
    pub max_angular_velocity: f32,
    /// Integer units per m/s (linear) and rad/s (angular).
    pub velocity_resolution: f32,
    pub orientation_bits: u32,
    /// Velocity magnitude below which a body counts as resting.
    pub at_rest_threshold: f32,
}

impl Default for QuantizationConfig {
    fn default() -> Self {
        Self {
            position_min: Vec3::new(-64.0, -64.0, 0.0),
            position_max: Vec3::new(64.0, 64.0, 32.0),
            position_resolution: 512.0,
            max_linear_velocity: 32.0,
            max_angular_velocity: 16.0,
            velocity_resolution: 256.0,
            orientation_bits: 9,
            at_rest_threshold: 0.05,
        }
    }
}

impl QuantizationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.position_min.cmplt(self.position_max).all() {
            return Err(invalid("position_min must be below position_max on every axis"));
        }
        if !(self.position_resolution > 0.0 && self.velocity_resolution > 0.0) {
            return Err(invalid("resolutions must be positive"));
        }
        if !(self.max_linear_velocity > 0.0 && self.max_angular_velocity > 0.0) {
            return Err(invalid("velocity bounds must be positive"));
        }
        if !(2..=MAX_ORIENTATION_BITS).contains(&self.orientation_bits) {
            return Err(invalid(format!(
                "orientation_bits must be in 2..={MAX_ORIENTATION_BITS}, got {}",
                self.orientation_bits
            )));
        }
        let extent = (self.position_max - self.position_min) * self.position_resolution;
        if extent.max_element() >= i32::MAX as f32 / 2.0 {
            return Err(invalid("position range does not fit a 32-bit integer"));
        }
        Ok(())
    }
}

/// Offset tiers for relative field coding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeBounds {
    pub small: i32,
    pub large: i32,
}

impl RelativeBounds {
    pub const fn new(small: i32, large: i32) -> Self {
        Self { small, large }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub relative_position: RelativeBounds,
    pub relative_orientation: RelativeBounds,
    /// Optional upper bound on the relative index encoding cost. Indices are still only used
    /// when they beat the per-object flags.
    pub index_threshold_bits: Option<usize>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            relative_position: RelativeBounds::new(16, 256),
            relative_orientation: RelativeBounds::new(16, 128),
            index_threshold_bits: None,
        }
    }
}

impl CodecConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, bounds) in [
            ("relative_position", self.relative_position),
            ("relative_orientation", self.relative_orientation),
        ] {
            if bounds.small < 1 || bounds.large <= bounds.small {
                return Err(invalid(format!(
                    "{name} needs 1 <= small < large, got {} / {}",
                    bounds.small, bounds.large
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// One-way latency in seconds.
    pub latency: f64,
    /// Maximum deviation added to `latency`, in seconds.
    pub jitter: f64,
    pub loss_percent: f64,
    pub capacity: usize,
    pub bandwidth_window: f64,
    pub seed: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            latency: 0.0,
            jitter: 0.0,
            loss_percent: 0.0,
            capacity: 1024,
            bandwidth_window: 0.5,
            seed: 0,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.latency < 0.0 || self.jitter < 0.0 {
            return Err(invalid("latency and jitter must not be negative"));
        }
        if !(0.0..=100.0).contains(&self.loss_percent) {
            return Err(invalid("loss_percent must be in 0..=100"));
        }
        if self.capacity == 0 {
            return Err(invalid("link capacity must be non-zero"));
        }
        if self.bandwidth_window <= 0.0 {
            return Err(invalid("bandwidth_window must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Snapshots per second.
    pub send_rate: f32,
    pub playout_delay: f64,
    pub interpolation: InterpolationMode,
    /// Forward horizon in seconds for `HermiteWithExtrapolation`.
    pub extrapolation: f32,
    pub num_objects: usize,
    pub player_index: Option<usize>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            send_rate: DEFAULT_SEND_RATE,
            playout_delay: 0.1,
            interpolation: InterpolationMode::Linear,
            extrapolation: 0.2,
            num_objects: 902,
            player_index: Some(0),
        }
    }
}

impl ProtocolConfig {
    pub fn send_interval(&self) -> f64 {
        1.0 / self.send_rate as f64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.send_rate <= 0.0 {
            return Err(invalid("send_rate must be positive"));
        }
        if self.playout_delay < 0.0 || self.extrapolation < 0.0 {
            return Err(invalid("playout_delay and extrapolation must not be negative"));
        }
        if self.num_objects == 0 || self.num_objects > u16::MAX as usize {
            return Err(invalid("num_objects must be in 1..=65535"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackerConfig {
    pub max_packet_bytes: usize,
    pub base_weight: f32,
    pub player_weight: f32,
    pub interacting_weight: f32,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            max_packet_bytes: DEFAULT_MAX_PACKET_BYTES,
            base_weight: 1.0,
            player_weight: 1_000_000.0,
            interacting_weight: 100.0,
        }
    }
}

impl PackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // room for the largest header: sequence, mode, initial flag, base
        if self.max_packet_bytes < 8 {
            return Err(invalid("max_packet_bytes must be at least 8"));
        }
        if self.base_weight < 0.0 || self.player_weight < 0.0 || self.interacting_weight < 0.0 {
            return Err(invalid("priority weights must not be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub window_size: usize,
    pub receive_size: usize,
    pub interpolation_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            window_size: 256,
            receive_size: 256,
            interpolation_size: 64,
        }
    }
}

impl BufferConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, size) in [
            ("window_size", self.window_size),
            ("receive_size", self.receive_size),
            ("interpolation_size", self.interpolation_size),
        ] {
            if size == 0 || size > u16::MAX as usize / 2 {
                return Err(invalid(format!("{name} must be in 1..=32767, got {size}")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub player_scale: f32,
    pub object_scale: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            player_scale: 1.0,
            object_scale: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SyncConfig::default().validate().unwrap();
    }

    #[test]
    fn parses_partial_toml() {
        let config = SyncConfig::from_toml_str(
            r#"
            [link]
            latency = 0.05
            loss_percent = 5.0

            [protocol]
            num_objects = 16
            interpolation = "hermite"

            [codec]
            index_threshold_bits = 900
            "#,
        )
        .unwrap();

        assert_eq!(config.link.latency, 0.05);
        assert_eq!(config.link.capacity, 1024);
        assert_eq!(config.protocol.num_objects, 16);
        assert_eq!(config.protocol.interpolation, InterpolationMode::Hermite);
        assert_eq!(config.codec.index_threshold_bits, Some(900));
        assert_eq!(config.quantization.orientation_bits, 9);
    }

    #[test]
    fn rejects_wide_orientation_codes() {
        let mut config = SyncConfig::default();
        config.quantization.orientation_bits = 11;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_player_outside_snapshot() {
        let mut config = SyncConfig::default();
        config.protocol.num_objects = 4;
        config.protocol.player_index = Some(4);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_packets_too_small_for_flags() {
        let mut config = SyncConfig::default();
        config.packer.max_packet_bytes = 64;
        assert!(config.validate().is_err());
        config.protocol.num_objects = 100;
        config.validate().unwrap();
    }

    #[test]
    fn interpolation_buffer_must_cover_playout_delay() {
        let mut config = SyncConfig::default();
        config.protocol.playout_delay = 2.0;
        assert!(config.validate().is_err());

        // 120 snapshots of delay need more than 121 slots
        config.buffers.interpolation_size = 121;
        assert!(config.validate().is_err());
        config.buffers.interpolation_size = 122;
        config.validate().unwrap();
    }

    #[test]
    fn receive_buffer_must_hold_the_send_window() {
        let mut config = SyncConfig::default();
        config.buffers.receive_size = 128;
        assert!(config.validate().is_err());
        config.buffers.window_size = 128;
        config.validate().unwrap();
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(matches!(
            SyncConfig::from_toml_str("[link]\nlatency = \"fast\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
