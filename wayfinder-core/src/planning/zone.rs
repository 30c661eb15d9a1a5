//! Horizontal frame partition used to localise obstacles.

use serde::{Deserialize, Serialize};

use super::{LEFT_ZONE_END, RIGHT_ZONE_START};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Left,
    Center,
    Right,
}

impl Zone {
    /// Zone for a center x normalised to [0, 1]. Both boundaries belong to
    /// CENTER; NaN also falls through to CENTER.
    pub fn from_normalized_x(x: f32) -> Self {
        if x < LEFT_ZONE_END {
            Zone::Left
        } else if x > RIGHT_ZONE_START {
            Zone::Right
        } else {
            Zone::Center
        }
    }

    pub fn is_side(self) -> bool {
        self != Zone::Center
    }
}
