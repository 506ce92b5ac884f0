use opencv::{
    core::{self, Mat, Rect},
    imgproc,
    prelude::*,
};

use crate::error::Error;
use crate::palette::{scalar, Bgr};

/// Deep copy of `frame` as 8-bit, 3-channel BGR.
pub fn to_bgr(frame: &Mat) -> Result<Mat, Error> {
    if frame.depth() != core::CV_8U {
        return Err(Error::RasterLayout {
            channels: frame.channels(),
        });
    }

    let mut out = Mat::default();
    match frame.channels() {
        3 => frame.copy_to(&mut out)?,
        1 => imgproc::cvt_color_def(frame, &mut out, imgproc::COLOR_GRAY2BGR)?,
        4 => imgproc::cvt_color_def(frame, &mut out, imgproc::COLOR_BGRA2BGR)?,
        channels => return Err(Error::RasterLayout { channels }),
    }

    Ok(out)
}

/// Fills the inclusive rectangle `(x1, y1)..=(x2, y2)` with `color` at
/// `alpha` opacity, clipped to the image.
pub fn blend_rect(
    img: &mut Mat,
    (x1, y1): (i32, i32),
    (x2, y2): (i32, i32),
    color: Bgr,
    alpha: f64,
) -> Result<(), Error> {
    let (cols, rows) = (img.cols(), img.rows());
    let (left, right) = (x1.min(x2).max(0), x1.max(x2).min(cols - 1));
    let (top, bottom) = (y1.min(y2).max(0), y1.max(y2).min(rows - 1));
    if left > right || top > bottom {
        return Ok(());
    }

    let rect = Rect::new(left, top, right - left + 1, bottom - top + 1);
    let base = Mat::roi(&*img, rect)?.try_clone()?;
    let overlay = Mat::new_rows_cols_with_default(rect.height, rect.width, base.typ(), scalar(color))?;

    let mut blended = Mat::default();
    core::add_weighted(&overlay, alpha, &base, 1.0 - alpha, 0.0, &mut blended, -1)?;

    let mut roi = img.roi_mut(rect)?;
    blended.copy_to(&mut roi)?;

    Ok(())
}

/// Tints `img` towards `color` where `alpha` (8-bit, same size) is set:
/// `px * (1 - a * opacity) + color * a * opacity` with `a = alpha / 255`.
pub fn tint_with_alpha(img: &mut Mat, alpha: &Mat, color: Bgr, opacity: f64) -> Result<(), Error> {
    let mut weights = Mat::default();
    alpha.convert_to(&mut weights, core::CV_32F, opacity / 255.0, 0.0)?;
    let mut keep = Mat::default();
    weights.convert_to(&mut keep, core::CV_32F, -1.0, 1.0)?;

    let overlay = Mat::new_rows_cols_with_default(img.rows(), img.cols(), img.typ(), scalar(color))?;
    let mut blended = Mat::default();
    imgproc::blend_linear(&overlay, &*img, &weights, &keep, &mut blended)?;
    blended.copy_to(img)?;

    Ok(())
}

#[cfg(test)]
pub(crate) fn solid(rows: i32, cols: i32, bgr: Bgr) -> Mat {
    Mat::new_rows_cols_with_default(rows, cols, core::CV_8UC3, crate::palette::scalar(bgr)).unwrap()
}

#[cfg(test)]
pub(crate) fn pixel(img: &Mat, x: i32, y: i32) -> Bgr {
    let px = img.at_2d::<core::Vec3b>(y, x).unwrap();
    [px[0], px[1], px[2]]
}
