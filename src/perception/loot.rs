use std::path::Path;

use image::{GrayImage, Rgb, RgbImage, imageops};
use imageproc::template_matching::{MatchTemplateMethod, find_extremes, match_template};
use log::debug;

use crate::{
    Error,
    utils::geometry::{Dimensions, Point},
};

/// Finds the loot icon on screen and tells where to click
pub struct LootLocalizer {
    template: RgbImage,
    template_gray: GrayImage,
    /// Shift from the icon center to the clickable loot
    offset: (i32, i32),
    /// Reject matches whose mean squared error is above this
    max_error: Option<f64>,
}

impl LootLocalizer {
    #[must_use]
    pub fn new(template: RgbImage, offset: (i32, i32), max_error: Option<f64>) -> Self {
        let template_gray = imageops::grayscale(&template);

        Self {
            template,
            template_gray,
            offset,
            max_error,
        }
    }

    /// Load the icon from a picture
    ///
    /// # Errors
    /// If the file can't be decoded
    pub fn from_path(
        path: impl AsRef<Path>,
        offset: (i32, i32),
        max_error: Option<f64>,
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        let template = image::open(path)
            .map_err(|e| Error::Template(format!("{}: {e}", path.display())))?
            .to_rgb8();

        Ok(Self::new(template, offset, max_error))
    }

    #[must_use]
    pub fn template_dimensions(&self) -> Dimensions {
        let (width, height) = self.template.dimensions();
        Dimensions { width, height }
    }

    /// Best normalized cross-correlation match.
    ///
    /// The best score gives the top-left corner of the icon, the returned point
    /// is the icon center shifted by the offset, kept on screen.
    /// `None` if the screenshot is smaller than the icon, or if the match is
    /// too different from the icon when an error limit is set.
    #[must_use]
    pub fn locate(&self, screenshot: &RgbImage) -> Option<Point> {
        let (tw, th) = self.template.dimensions();
        let (sw, sh) = screenshot.dimensions();
        if tw == 0 || th == 0 || tw > sw || th > sh {
            return None;
        }

        let scores = match_template(
            &imageops::grayscale(screenshot),
            &self.template_gray,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );
        let extremes = find_extremes(&scores);
        let (x, y) = extremes.max_value_location;
        debug!("Loot icon best score {} at ({x}, {y})", extremes.max_value);

        if let Some(max_error) = self.max_error {
            let error = self.match_error(screenshot, x, y);
            if error > max_error {
                debug!("Loot icon rejected, error {error:.1} > {max_error:.1}");
                return None;
            }
        }

        let center = Point {
            x: x + tw / 2,
            y: y + th / 2,
        };

        Some((center + self.offset).clamp_to(&Dimensions {
            width: sw,
            height: sh,
        }))
    }

    /// Mean squared error between the icon and the screenshot area whose
    /// top-left corner is (`x`, `y`), both reduced to their channel mean.
    ///
    /// The area spans the icon width along x and the icon height along y.
    #[must_use]
    pub fn match_error(&self, screenshot: &RgbImage, x: u32, y: u32) -> f64 {
        let (tw, th) = self.template.dimensions();
        let area = imageops::crop_imm(screenshot, x, y, tw, th).to_image();
        if area.dimensions() != (tw, th) {
            return f64::INFINITY;
        }

        let channel_mean = |p: &Rgb<u8>| p.0.iter().map(|&c| f64::from(c)).sum::<f64>() / 3.;
        let total = area
            .pixels()
            .zip(self.template.pixels())
            .map(|(a, t)| (channel_mean(a) - channel_mean(t)).powi(2))
            .sum::<f64>();

        total / (f64::from(tw) * f64::from(th))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Textured background that never repeats the icon pattern
    fn background(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = u8::try_from((x * 7 + y * 13) % 50 + 20).unwrap();
            Rgb([v, v / 2 + 10, 60 - v / 3])
        })
    }

    /// Skull-ish icon, not square so axis mix-ups show
    fn icon() -> RgbImage {
        RgbImage::from_fn(12, 7, |x, y| {
            let v = u8::try_from(120 + (x * 11 + y * y * 17) % 130).unwrap();
            Rgb([v, v, 255 - v / 4])
        })
    }

    fn screenshot_with_icon(at: (u32, u32)) -> RgbImage {
        let mut screen = background(160, 90);
        imageops::replace(&mut screen, &icon(), i64::from(at.0), i64::from(at.1));
        screen
    }

    #[test]
    fn returns_icon_center_plus_offset() {
        let localizer = LootLocalizer::new(icon(), (0, 20), None);
        let screen = screenshot_with_icon((41, 23));

        // center is (41 + 6, 23 + 3)
        assert_eq!(localizer.locate(&screen), Some(Point { x: 47, y: 46 }));
    }

    #[test]
    fn negative_offset_is_applied() {
        let localizer = LootLocalizer::new(icon(), (-10, -5), None);
        let screen = screenshot_with_icon((100, 60));

        assert_eq!(localizer.locate(&screen), Some(Point { x: 96, y: 58 }));
    }

    #[test]
    fn result_is_kept_on_screen() {
        let localizer = LootLocalizer::new(icon(), (0, 500), None);
        let screen = screenshot_with_icon((10, 10));

        assert_eq!(localizer.locate(&screen), Some(Point { x: 16, y: 89 }));
    }

    #[test]
    fn exact_match_has_no_error_and_passes_the_check() {
        let localizer = LootLocalizer::new(icon(), (0, 0), Some(1.));
        let screen = screenshot_with_icon((70, 5));

        assert!(localizer.match_error(&screen, 70, 5) < f64::EPSILON);
        assert_eq!(localizer.locate(&screen), Some(Point { x: 76, y: 8 }));
    }

    #[test]
    fn error_crop_follows_icon_axes() {
        // icon is 12 wide and 7 high: cropping 7 wide by 12 high at the match
        // would include background rows and report an error
        let localizer = LootLocalizer::new(icon(), (0, 0), None);
        let screen = screenshot_with_icon((30, 40));

        assert!(localizer.match_error(&screen, 30, 40) < f64::EPSILON);
        assert!(localizer.match_error(&screen, 31, 40) > 1.);
        assert!(localizer.match_error(&screen, 30, 41) > 1.);
    }

    #[test]
    fn error_crop_past_the_edge_is_rejected() {
        let localizer = LootLocalizer::new(icon(), (0, 0), None);
        let screen = background(40, 40);

        assert!(localizer.match_error(&screen, 35, 0).is_infinite());
    }

    #[test]
    fn poor_match_is_rejected_with_error_limit() {
        let localizer = LootLocalizer::new(icon(), (0, 0), Some(25.));

        assert_eq!(localizer.locate(&background(160, 90)), None);
    }

    #[test]
    fn screenshot_smaller_than_icon_is_not_found() {
        let localizer = LootLocalizer::new(icon(), (0, 0), None);

        assert_eq!(localizer.locate(&background(10, 10)), None);
    }

    #[test]
    fn icon_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loot.png");
        icon().save(&path).unwrap();

        let localizer = LootLocalizer::from_path(&path, (0, 0), None).unwrap();
        assert_eq!(
            localizer.template_dimensions(),
            Dimensions {
                width: 12,
                height: 7
            }
        );
        assert!(LootLocalizer::from_path(dir.path().join("missing.png"), (0, 0), None).is_err());
    }
}
