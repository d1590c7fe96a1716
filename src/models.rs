//! Vision models seen as black boxes: load once, then infer on frames.
//!
//! The bot only relies on [`VisionModel`]. The bundled implementations are
//! pixel heuristics tuned by a JSON checkpoint, any other backend (a neural
//! network for instance) can take their place by implementing the trait.

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{GenericImageView, RgbImage, imageops};
use log::warn;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    Error,
    perception::mask::ProbabilityMask,
    utils::{
        colors::{COLOR_BOBBER, COLOR_FOAM, ColorTarget},
        debug::unique_path,
        helpers::unix_millis,
    },
};

pub trait VisionModel {
    type Output;

    /// Load the model
    ///
    /// # Errors
    /// Unreadable or invalid checkpoint
    fn from_checkpoint(path: &Path) -> Result<Self, Error>
    where
        Self: Sized;

    /// Run the model on one frame, no state is kept between calls
    ///
    /// # Errors
    /// Frame the model can't work with
    fn infer(&self, image: &RgbImage) -> Result<Self::Output, Error>;

    fn name(&self) -> &str;
}

/// Bobber model: full frame in, probability mask at model resolution out
pub type BobberModel = dyn VisionModel<Output = ProbabilityMask>;

/// Splash model: crop around the bobber in, splash probability out
pub type SplashModel = dyn VisionModel<Output = f32>;

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Colors of the bobber feathers, matched on a downscaled frame
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorBobberModel {
    /// Model resolution
    pub input_width: u32,
    pub input_height: u32,
    pub palette: Vec<ColorTarget>,
}

impl Default for ColorBobberModel {
    fn default() -> Self {
        Self {
            input_width: 320,
            input_height: 224,
            palette: COLOR_BOBBER.to_vec(),
        }
    }
}

impl VisionModel for ColorBobberModel {
    type Output = ProbabilityMask;

    fn from_checkpoint(path: &Path) -> Result<Self, Error> {
        let model: Self = load_json(path)?;
        if model.input_width == 0 || model.input_height == 0 || model.palette.is_empty() {
            return Err(Error::Model(format!(
                "{}: empty resolution or palette",
                path.display()
            )));
        }

        Ok(model)
    }

    fn infer(&self, image: &RgbImage) -> Result<ProbabilityMask, Error> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::Model("empty frame".into()));
        }

        let small = imageops::resize(
            image,
            self.input_width,
            self.input_height,
            imageops::FilterType::Triangle,
        );

        Ok(ProbabilityMask::from_fn(
            self.input_width,
            self.input_height,
            |x, y| {
                let pixel = *small.get_pixel(x, y);
                self.palette
                    .iter()
                    .map(|t| t.closeness(pixel))
                    .fold(0., f32::max)
            },
        ))
    }

    fn name(&self) -> &str {
        "ColorBobberModel"
    }
}

/// Share of foam pixels around the bobber
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FoamSplashModel {
    /// Side of the centered square looked at
    pub size: u32,
    pub foam: ColorTarget,
    /// Foam share at which the probability reaches 1
    pub saturation: f32,
}

impl Default for FoamSplashModel {
    fn default() -> Self {
        Self {
            size: 64,
            foam: COLOR_FOAM.clone(),
            saturation: 0.12,
        }
    }
}

impl VisionModel for FoamSplashModel {
    type Output = f32;

    fn from_checkpoint(path: &Path) -> Result<Self, Error> {
        let model: Self = load_json(path)?;
        if model.size == 0 || model.saturation <= 0. {
            return Err(Error::Model(format!(
                "{}: size and saturation must be positive",
                path.display()
            )));
        }

        Ok(model)
    }

    fn infer(&self, image: &RgbImage) -> Result<f32, Error> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::Model("empty frame".into()));
        }

        // Center crop, smaller frames are used whole
        let (w, h) = (self.size.min(width), self.size.min(height));
        let crop = imageops::crop_imm(image, (width - w) / 2, (height - h) / 2, w, h);

        let foam = crop
            .pixels()
            .filter(|(_, _, p)| self.foam.matches(*p))
            .count();

        #[allow(clippy::cast_precision_loss)]
        let share = foam as f32 / (u64::from(w) * u64::from(h)) as f32;

        Ok((share / self.saturation).min(1.))
    }

    fn name(&self) -> &str {
        "FoamSplashModel"
    }
}

/// Model output that can be written next to its input frame
pub trait Snapshot {
    /// Write to `stem` plus an extension
    ///
    /// # Errors
    /// Filesystem or encoding failure
    fn save_to(&self, stem: &Path) -> Result<(), Error>;
}

impl Snapshot for f32 {
    fn save_to(&self, stem: &Path) -> Result<(), Error> {
        let json = serde_json::json!({ "probability": self });
        fs::write(stem.with_extension("json"), serde_json::to_string_pretty(&json)?)?;
        Ok(())
    }
}

impl Snapshot for ProbabilityMask {
    fn save_to(&self, stem: &Path) -> Result<(), Error> {
        self.to_gray().save(stem.with_extension("mask.png"))?;
        Ok(())
    }
}

/// Saves every input frame and output of the wrapped model under
/// `<directory>/<model name>/`
pub struct Recorded<M> {
    inner: M,
    directory: PathBuf,
}

impl<M: VisionModel> Recorded<M>
where
    M::Output: Snapshot,
{
    pub fn new(inner: M, directory: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            directory: directory.into(),
        }
    }

    fn save(&self, image: &RgbImage, output: &M::Output) -> Result<(), Error> {
        let path = unique_path(
            self.directory
                .join(self.inner.name())
                .join(format!("{}.png", unix_millis())),
            false,
        )?;

        image.save(&path)?;
        output.save_to(&path.with_extension(""))
    }
}

impl<M: VisionModel> VisionModel for Recorded<M>
where
    M::Output: Snapshot,
{
    type Output = M::Output;

    fn from_checkpoint(path: &Path) -> Result<Self, Error> {
        Ok(Self::new(M::from_checkpoint(path)?, "logs"))
    }

    fn infer(&self, image: &RgbImage) -> Result<M::Output, Error> {
        let output = self.inner.infer(image)?;
        if let Err(e) = self.save(image, &output) {
            warn!("Couldn't save {} sample: {e}", self.inner.name());
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
