use image::Rgb;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "ColorSpec", into = "ColorSpec")]
pub struct ColorTarget {
    pub color: Rgb<u8>,
    pub variation: u8,
}

/// On-disk form of a [`ColorTarget`]
#[derive(Clone, Serialize, Deserialize)]
struct ColorSpec {
    rgb: [u8; 3],
    variation: u8,
}

impl From<ColorSpec> for ColorTarget {
    fn from(spec: ColorSpec) -> Self {
        ColorTarget {
            color: Rgb(spec.rgb),
            variation: spec.variation,
        }
    }
}

impl From<ColorTarget> for ColorSpec {
    fn from(target: ColorTarget) -> Self {
        ColorSpec {
            rgb: target.color.0,
            variation: target.variation,
        }
    }
}

impl ColorTarget {
    /// Largest per-channel distance to the target
    fn distance(&self, pixel: Rgb<u8>) -> u8 {
        let Rgb([tr, tg, tb]) = self.color;
        let Rgb([r, g, b]) = pixel;

        r.abs_diff(tr).max(g.abs_diff(tg)).max(b.abs_diff(tb))
    }

    #[must_use]
    pub fn matches(&self, pixel: Rgb<u8>) -> bool {
        self.distance(pixel) <= self.variation
    }

    /// Soft version of [`ColorTarget::matches`]: 1 inside the variation,
    /// fading linearly to 0 at twice the variation
    #[must_use]
    pub fn closeness(&self, pixel: Rgb<u8>) -> f32 {
        let distance = f32::from(self.distance(pixel));
        let variation = f32::from(self.variation.max(1));

        if distance <= variation {
            1.
        } else {
            (2. - distance / variation).max(0.)
        }
    }
}

/// Red and blue feathers of the bobber
pub static COLOR_BOBBER: &[ColorTarget] = &[
    ColorTarget {
        color: Rgb([0xa8, 0x1c, 0x1a]),
        variation: 40,
    },
    ColorTarget {
        color: Rgb([0x2a, 0x3a, 0x8c]),
        variation: 35,
    },
];

/// Foam thrown up by a splash
pub static COLOR_FOAM: ColorTarget = ColorTarget {
    color: Rgb([0xf0, 0xf4, 0xf8]),
    variation: 45,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closeness_fades_outside_variation() {
        let target = ColorTarget {
            color: Rgb([100, 100, 100]),
            variation: 10,
        };

        assert!(target.matches(Rgb([110, 95, 100])));
        assert!((target.closeness(Rgb([110, 95, 100])) - 1.).abs() < f32::EPSILON);
        assert!((target.closeness(Rgb([115, 100, 100])) - 0.5).abs() < 1e-6);
        assert!(target.closeness(Rgb([130, 100, 100])).abs() < f32::EPSILON);
        assert!(!target.matches(Rgb([115, 100, 100])));
    }

    #[test]
    fn targets_load_from_json() {
        let target: ColorTarget =
            serde_json::from_str(r#"{ "rgb": [1, 2, 3], "variation": 4 }"#).unwrap();

        assert_eq!(
            target,
            ColorTarget {
                color: Rgb([1, 2, 3]),
                variation: 4
            }
        );
    }
}
