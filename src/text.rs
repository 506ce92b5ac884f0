use std::path::Path;

use opencv::{
    core::{Mat, Point, Scalar, Size},
    imgproc,
    prelude::*,
};
use tracing::{debug, warn};

use crate::error::Error;

/// Approximate cap height of Hershey simplex at scale 1.0, used to map a
/// Hershey scale onto a TTF pixel height.
#[cfg(feature = "freetype")]
const HERSHEY_PX_PER_SCALE: f64 = 22.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub scale: f64,
    pub thickness: i32,
}

impl TextStyle {
    pub const fn new(scale: f64, thickness: i32) -> Self {
        Self { scale, thickness }
    }

    #[cfg(feature = "freetype")]
    #[inline]
    fn pixel_height(&self) -> i32 {
        (self.scale * HERSHEY_PX_PER_SCALE).round() as i32
    }
}

/// Text backend. Hershey simplex always works but only covers ASCII; with the
/// `freetype` feature a TTF face is loaded once and serves every height.
pub struct Typeface {
    #[cfg(feature = "freetype")]
    face: Option<opencv::core::Ptr<opencv::freetype::FreeType2>>,
}

impl Default for Typeface {
    fn default() -> Self {
        Self::hershey()
    }
}

impl Typeface {
    pub fn hershey() -> Self {
        Self {
            #[cfg(feature = "freetype")]
            face: None,
        }
    }

    /// Loads `path` as a TTF face, falling back to Hershey when the file or
    /// the FreeType backend is unavailable.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        #[cfg(feature = "freetype")]
        {
            match load_face(path) {
                Ok(face) => {
                    debug!("loaded font {}", path.display());
                    return Self { face: Some(face) };
                }
                Err(err) => {
                    warn!("font {} not usable ({}), using Hershey", path.display(), err);
                }
            }
        }

        #[cfg(not(feature = "freetype"))]
        {
            if path.exists() {
                debug!("built without freetype, ignoring font {}", path.display());
            } else {
                warn!("font {} not found, using Hershey", path.display());
            }
        }

        Self::hershey()
    }

    #[cfg(feature = "freetype")]
    #[inline]
    pub fn is_truetype(&self) -> bool {
        self.face.is_some()
    }

    #[cfg(not(feature = "freetype"))]
    #[inline]
    pub fn is_truetype(&self) -> bool {
        false
    }

    /// Rendered size and baseline offset of `text`.
    pub fn measure(&mut self, text: &str, style: TextStyle) -> Result<(Size, i32), Error> {
        let mut baseline = 0;

        #[cfg(feature = "freetype")]
        {
            if let Some(face) = self.face.as_mut() {
                let size = face.get_text_size(text, style.pixel_height(), -1, &mut baseline)?;
                return Ok((size, baseline));
            }
        }

        let size = imgproc::get_text_size(
            text,
            imgproc::FONT_HERSHEY_SIMPLEX,
            style.scale,
            style.thickness,
            &mut baseline,
        )?;

        Ok((size, baseline))
    }

    /// Draws `text` with its baseline starting at `org`.
    pub fn draw(
        &mut self,
        img: &mut Mat,
        text: &str,
        org: Point,
        style: TextStyle,
        color: Scalar,
    ) -> Result<(), Error> {
        #[cfg(feature = "freetype")]
        {
            if let Some(face) = self.face.as_mut() {
                face.put_text(
                    img,
                    text,
                    org,
                    style.pixel_height(),
                    color,
                    -1,
                    imgproc::LINE_AA,
                    true,
                )?;
                return Ok(());
            }
        }

        imgproc::put_text(
            img,
            text,
            org,
            imgproc::FONT_HERSHEY_SIMPLEX,
            style.scale,
            color,
            style.thickness,
            imgproc::LINE_AA,
            false,
        )?;

        Ok(())
    }
}

#[cfg(feature = "freetype")]
fn load_face(path: &Path) -> Result<opencv::core::Ptr<opencv::freetype::FreeType2>, Error> {
    if !path.exists() {
        return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "font file missing").into());
    }

    let mut face = opencv::freetype::create_free_type2()?;
    face.load_font_data(&path.to_string_lossy(), 0)?;

    Ok(face)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hershey_measures_text() {
        let mut face = Typeface::hershey();
        let (small, _) = face.measure("ID 7", TextStyle::new(0.5, 1)).unwrap();
        let (large, _) = face.measure("ID 7", TextStyle::new(1.0, 1)).unwrap();

        assert!(small.width > 0 && small.height > 0);
        assert!(large.width > small.width);
        assert!(!face.is_truetype());
    }

    #[test]
    fn missing_font_falls_back() {
        let face = Typeface::load("/nonexistent/DejaVuSans.ttf");
        assert!(!face.is_truetype());
    }
}
