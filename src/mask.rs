use opencv::{
    core::{self, Mat, Size},
    imgcodecs, imgproc,
    prelude::*,
};
use tracing::{debug, warn};

use crate::config::MaskConfig;
use crate::error::Error;
use crate::palette::Bgr;
use crate::raster;

/// Named region-of-interest tint. Without a raster the mask is a no-op.
pub struct RoiMask {
    pub name: String,
    pub color: Bgr,
    pub opacity: f64,
    alpha: Option<Mat>,
}

impl RoiMask {
    pub fn load(cfg: &MaskConfig) -> Self {
        let alpha = if cfg.path.exists() {
            match read_alpha(&cfg.path.to_string_lossy()) {
                Ok(alpha) => alpha,
                Err(err) => {
                    warn!("mask `{}` ({}) unusable: {}", cfg.name, cfg.path.display(), err);
                    None
                }
            }
        } else {
            debug!("mask `{}` not found at {}", cfg.name, cfg.path.display());
            None
        };

        Self {
            name: cfg.name.clone(),
            color: cfg.color,
            opacity: cfg.opacity,
            alpha,
        }
    }

    /// Builds a mask from an 8-bit single-channel alpha raster.
    pub fn from_alpha(name: &str, color: Bgr, opacity: f64, alpha: Mat) -> Self {
        Self {
            name: name.to_string(),
            color,
            opacity,
            alpha: Some(alpha),
        }
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.alpha.is_some()
    }

    /// Tints `frame` in place; the alpha raster is stretched to the frame size.
    pub fn apply(&self, frame: &mut Mat) -> Result<(), Error> {
        let alpha = match &self.alpha {
            Some(alpha) => alpha,
            None => return Ok(()),
        };

        let size = Size::new(frame.cols(), frame.rows());
        if alpha.size()? == size {
            return raster::tint_with_alpha(frame, alpha, self.color, self.opacity);
        }

        let mut resized = Mat::default();
        imgproc::resize(alpha, &mut resized, size, 0.0, 0.0, imgproc::INTER_LINEAR)?;

        raster::tint_with_alpha(frame, &resized, self.color, self.opacity)
    }
}

/// Alpha channel of a mask image: gray values for one channel, fully opaque
/// for three, the fourth channel for four. Other layouts give `None`.
fn read_alpha(path: &str) -> Result<Option<Mat>, Error> {
    let mut img = imgcodecs::imread(path, imgcodecs::IMREAD_UNCHANGED)?;
    if img.empty() {
        return Ok(None);
    }

    if img.depth() != core::CV_8U {
        let mut scaled = Mat::default();
        let scale = if img.depth() == core::CV_16U || img.depth() == core::CV_16S {
            1.0 / 257.0
        } else {
            255.0
        };
        img.convert_to(&mut scaled, core::CV_8U, scale, 0.0)?;
        img = scaled;
    }

    let alpha = match img.channels() {
        1 => img,
        3 => Mat::new_rows_cols_with_default(
            img.rows(),
            img.cols(),
            core::CV_8UC1,
            core::Scalar::all(255.0),
        )?,
        4 => {
            let mut alpha = Mat::default();
            core::extract_channel(&img, &mut alpha, 3)?;
            alpha
        }
        other => {
            debug!("ignoring mask {} with {} channels", path, other);
            return Ok(None);
        }
    };

    Ok(Some(alpha))
}
