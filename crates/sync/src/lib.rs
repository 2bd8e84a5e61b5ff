pub mod bitstream;
pub mod codec;
pub mod config;
pub mod interpolation;
pub mod metrics;
pub mod net;
pub mod priority;
pub mod quantize;
pub mod sequence;
pub mod session;
pub mod state;
pub mod view;

pub use bitstream::{BitCounter, BitReader, BitWrite, BitWriter, StreamError, bits_required};
pub use codec::{
    AckPacket, Baseline, CodecError, DeltaMode, PacketHeader, SnapshotCodec, SnapshotFrame,
    SnapshotPacket, apply_updates, delta_updates,
};
pub use config::{
    BufferConfig, CodecConfig, ConfigError, DEFAULT_MAX_PACKET_BYTES, DEFAULT_SEND_RATE,
    LinkConfig, PackerConfig, ProtocolConfig, QuantizationConfig, RelativeBounds, SyncConfig,
    ViewConfig,
};
pub use interpolation::{
    InterpolationBuffer, InterpolationMode, InterpolationStats, InterpolationWindow,
};
pub use metrics::{DeltaStats, Histogram, MetricsSink, NullMetrics};
pub use net::{BandwidthTracker, LinkStats, NetworkSimulator};
pub use priority::PriorityAccumulator;
pub use quantize::{CompressedOrientation, Quantizer};
pub use sequence::{
    SequenceBuffer, SlidingWindow, sequence_difference, sequence_greater_than, sequence_less_than,
};
pub use session::{Receiver, ReceiverStats, Sender, SenderStats, SyncSession};
pub use state::{ActiveObject, QuantizedRigidBodyState, QuantizedSnapshot, RigidBodyState, Snapshot};
pub use view::ObjectUpdate;
