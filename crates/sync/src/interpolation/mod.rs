//! Receiver-side jitter buffer and interpolation.

mod buffer;
mod curve;

pub use buffer::{InterpolationBuffer, InterpolationStats, InterpolationWindow};
pub use curve::{hermite, hermite_state, linear, slerp};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMode {
    #[default]
    Linear,
    Hermite,
    HermiteWithExtrapolation,
}
