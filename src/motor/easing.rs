use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// Progress curves for moves and tweens; the in/out curves are quartic
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    EaseOutElastic,
}

impl Easing {
    /// Map normalized time `t` to normalized progress
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => t.powi(4),
            Self::EaseOut => -((t - 1.0).powi(4) - 1.0),
            Self::EaseInOut => {
                if t < 0.5 {
                    8.0 * t.powi(4)
                } else {
                    1.0 - 8.0 * (t - 1.0).powi(4)
                }
            }
            Self::EaseOutElastic => {
                // The damped sine overshoots 1.0 slightly at t = 1
                if t <= 0.0 {
                    0.0
                } else if t >= 1.0 {
                    1.0
                } else {
                    2f32.powf(-10.0 * t) * ((t - 0.075) * (2.0 * PI / 0.3)).sin() + 1.0
                }
            }
        }
    }

    /// Portion of `total` covered at normalized time `t`
    pub fn value(self, t: f32, total: f32) -> f32 {
        self.apply(t) * total
    }
}
