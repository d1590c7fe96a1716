use image::Luma;
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::{
    Error,
    perception::mask::{PriorMask, ProbabilityMask},
    utils::{
        geometry::{Dimensions, Point},
        helpers::BadCast,
    },
};

/// Pixel count and coordinate sums of one blob
#[derive(Clone, Copy, Default)]
struct Blob {
    pixels: u64,
    sum_x: u64,
    sum_y: u64,
}

/// Turn a bobber probability mask into a screen position.
///
/// The prior (if any) is multiplied in first, then the mask is thresholded
/// (`value > threshold`) and its 8-connected blobs are labelled. The biggest
/// blob wins, on equal size the one met first in raster order. Its centroid
/// is scaled from mask resolution to `screen`, using pixel centers, so the
/// middle of the mask lands on the middle of the screen.
///
/// Returns `Ok(None)` when nothing is above the threshold: the cast failed.
///
/// # Errors
/// If the prior resolution doesn't match the mask one
pub fn locate(
    mut mask: ProbabilityMask,
    prior: Option<&PriorMask>,
    threshold: f32,
    screen: &Dimensions,
) -> Result<Option<Point>, Error> {
    if let Some(prior) = prior {
        mask.apply_prior(prior)?;
    }

    let binary = mask.binarize(threshold);
    if binary.pixels().all(|p| p[0] == 0) {
        return Ok(None);
    }

    let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

    let mut blobs: Vec<Blob> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let Ok(label) = usize::try_from(label[0]) else {
            continue;
        };
        if label == 0 {
            continue;
        }
        if blobs.len() < label {
            blobs.resize(label, Blob::default());
        }

        let blob = &mut blobs[label - 1];
        blob.pixels += 1;
        blob.sum_x += u64::from(x);
        blob.sum_y += u64::from(y);
    }

    // Labels follow raster order, keeping the first max resolves ties
    let Some(blob) = blobs.iter().fold(None::<&Blob>, |best, blob| match best {
        Some(b) if b.pixels >= blob.pixels => Some(b),
        _ => Some(blob),
    }) else {
        return Ok(None);
    };

    #[allow(clippy::cast_precision_loss)]
    let (mean_x, mean_y) = (
        blob.sum_x as f64 / blob.pixels as f64,
        blob.sum_y as f64 / blob.pixels as f64,
    );

    let dims = mask.dimensions();
    let point = Point {
        x: ((mean_x + 0.5) * f64::from(screen.width) / f64::from(dims.width)).bad_cast(),
        y: ((mean_y + 0.5) * f64::from(screen.height) / f64::from(dims.height)).bad_cast(),
    };

    Ok(Some(point.clamp_to(screen)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Dimensions = Dimensions {
        width: 1920,
        height: 1080,
    };

    /// Mask of `width`x`height` with 0.9 on the given rectangles (x, y, w, h)
    fn mask_with(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> ProbabilityMask {
        ProbabilityMask::from_fn(width, height, |x, y| {
            if rects
                .iter()
                .any(|&(rx, ry, rw, rh)| (rx..rx + rw).contains(&x) && (ry..ry + rh).contains(&y))
            {
                0.9
            } else {
                0.05
            }
        })
    }

    #[test]
    fn nothing_above_threshold_is_not_found() {
        let mask = ProbabilityMask::from_fn(32, 24, |x, y| if (x + y) % 2 == 0 { 0.3 } else { 0. });

        assert_eq!(locate(mask, None, 0.3, &SCREEN).unwrap(), None);
    }

    #[test]
    fn single_blob_centroid_is_rescaled() {
        // 2x2 blob around the middle of a 10x8 mask
        let mask = mask_with(10, 8, &[(4, 3, 2, 2)]);

        assert_eq!(
            locate(mask, None, 0.5, &SCREEN).unwrap(),
            Some(Point { x: 960, y: 540 })
        );
    }

    #[test]
    fn rescaling_is_linear_for_any_size_pair() {
        for (mw, mh, sw, sh) in [(9, 9, 100, 60), (320, 224, 1920, 1080), (3, 5, 2560, 1440)] {
            // blob symmetric around the mask middle: 1 pixel on odd sides, 2 on even ones
            let (bx, bw) = if mw % 2 == 0 { (mw / 2 - 1, 2) } else { (mw / 2, 1) };
            let (by, bh) = if mh % 2 == 0 { (mh / 2 - 1, 2) } else { (mh / 2, 1) };
            let mask = mask_with(mw, mh, &[(bx, by, bw, bh)]);
            let screen = Dimensions {
                width: sw,
                height: sh,
            };

            assert_eq!(
                locate(mask, None, 0.5, &screen).unwrap(),
                Some(Point {
                    x: sw / 2,
                    y: sh / 2
                }),
                "{mw}x{mh} -> {sw}x{sh}"
            );
        }
    }

    #[test]
    fn off_center_blob_maps_proportionally() {
        // pixel (1, 1) of a 4x4 mask covers [0.25, 0.5) of the screen on both axes
        let mask = mask_with(4, 4, &[(1, 1, 1, 1)]);
        let screen = Dimensions {
            width: 400,
            height: 200,
        };

        assert_eq!(
            locate(mask, None, 0.5, &screen).unwrap(),
            Some(Point { x: 150, y: 75 })
        );
    }

    #[test]
    fn largest_blob_wins() {
        // small speckle first in raster order, bigger blob later
        let mask = mask_with(20, 20, &[(1, 1, 2, 2), (10, 12, 4, 3)]);
        let screen = Dimensions {
            width: 20,
            height: 20,
        };

        // centroid (11.5, 13) -> pixel centers (12, 13.5)
        assert_eq!(
            locate(mask, None, 0.5, &screen).unwrap(),
            Some(Point { x: 12, y: 13 })
        );
    }

    #[test]
    fn equal_blobs_resolve_to_first_found() {
        let mask = mask_with(20, 20, &[(14, 2, 2, 2), (2, 10, 2, 2)]);
        let screen = Dimensions {
            width: 20,
            height: 20,
        };

        assert_eq!(
            locate(mask, None, 0.5, &screen).unwrap(),
            Some(Point { x: 15, y: 3 })
        );
    }

    #[test]
    fn diagonal_pixels_form_one_blob() {
        // three diagonal pixels outweigh a 2-pixel bar only with 8-connectivity
        let mask = mask_with(
            10,
            10,
            &[(1, 1, 1, 1), (2, 2, 1, 1), (3, 3, 1, 1), (7, 7, 2, 1)],
        );
        let screen = Dimensions {
            width: 10,
            height: 10,
        };

        assert_eq!(
            locate(mask, None, 0.5, &screen).unwrap(),
            Some(Point { x: 2, y: 2 })
        );
    }

    #[test]
    fn prior_removes_detections_far_from_center() {
        // strong blob in a corner, weaker one near the expected spot
        let mask = ProbabilityMask::from_fn(40, 40, |x, y| match (x, y) {
            (0..=5, 34..=39) => 0.95,
            (19..=21, 17..=19) => 0.5,
            _ => 0.,
        });
        let prior = PriorMask::gaussian(40, 40);

        let without = locate(mask.clone(), None, 0.2, &SCREEN).unwrap().unwrap();
        assert!(without.x < 200 && without.y > 900);

        let with = locate(mask, Some(&prior), 0.2, &SCREEN).unwrap().unwrap();
        assert_eq!(with, Point { x: 984, y: 499 });
    }

    #[test]
    fn prior_shape_mismatch_is_an_error() {
        let mask = mask_with(10, 10, &[(4, 4, 2, 2)]);
        let prior = PriorMask::gaussian(20, 20);

        assert!(locate(mask, Some(&prior), 0.5, &SCREEN).is_err());
    }
}
