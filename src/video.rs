use std::path::Path;

use opencv::{
    core::{Mat, Size},
    prelude::*,
    videoio,
};
use tracing::{debug, warn};

use crate::error::Error;

/// Sequential reader over a video file. The capture is released on drop.
pub struct VideoSource {
    cap: videoio::VideoCapture,
}

impl VideoSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let name = path.to_string_lossy().into_owned();
        if !path.exists() {
            return Err(Error::VideoOpen(name));
        }

        let cap = videoio::VideoCapture::from_file(&name, videoio::CAP_ANY)?;
        if !cap.is_opened()? {
            return Err(Error::VideoOpen(name));
        }

        Ok(Self { cap })
    }

    #[inline]
    fn prop(&self, id: i32) -> f64 {
        self.cap.get(id).unwrap_or(0.0)
    }

    pub fn width(&self) -> i32 {
        self.prop(videoio::CAP_PROP_FRAME_WIDTH) as i32
    }

    pub fn height(&self) -> i32 {
        self.prop(videoio::CAP_PROP_FRAME_HEIGHT) as i32
    }

    pub fn fps(&self) -> f64 {
        self.prop(videoio::CAP_PROP_FPS)
    }

    /// Container-reported frame count; 0 when unknown.
    pub fn frame_count(&self) -> u64 {
        self.prop(videoio::CAP_PROP_FRAME_COUNT).max(0.0) as u64
    }

    pub fn fourcc(&self) -> u32 {
        self.prop(videoio::CAP_PROP_FOURCC) as i64 as u32
    }

    /// Next frame, or `None` at the end of the stream.
    pub fn read(&mut self) -> Result<Option<Mat>, Error> {
        let mut frame = Mat::default();
        if !self.cap.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }

        Ok(Some(frame))
    }

    pub fn seek(&mut self, idx: u64) -> Result<bool, Error> {
        Ok(self.cap.set(videoio::CAP_PROP_POS_FRAMES, idx as f64)?)
    }

    fn seek_and_read(&mut self, idx: u64) -> Option<Mat> {
        match self.seek(idx).and_then(|_| self.read()) {
            Ok(frame) => frame,
            Err(err) => {
                debug!("seek to frame {} failed: {}", idx, err);
                None
            }
        }
    }

    /// Random access with two fallbacks: a couple of frames earlier (reads
    /// at the very end of a file often fail), then a sequential scan from 0.
    pub fn frame_at(&mut self, idx: u64) -> Option<Mat> {
        let total = self.frame_count();
        let idx = if total > 0 { idx.min(total - 1) } else { idx };

        if let Some(frame) = self.seek_and_read(idx) {
            return Some(frame);
        }
        if total == 0 {
            return None;
        }

        let earlier = idx.saturating_sub(2);
        if earlier != idx {
            if let Some(frame) = self.seek_and_read(earlier) {
                return Some(frame);
            }
        }

        if !matches!(self.seek(0), Ok(true)) {
            debug!("rewind failed, scanning from current position");
        }
        let mut last = None;
        for _ in 0..=idx {
            match self.read() {
                Ok(Some(frame)) => last = Some(frame),
                _ => return None,
            }
        }

        last
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        if let Err(err) = self.cap.release() {
            warn!("releasing capture failed: {}", err);
        }
    }
}

/// Reads one frame by index; `None` when the file or the frame is unreadable.
pub fn read_frame<P: AsRef<Path>>(path: P, idx: u64) -> Option<Mat> {
    match VideoSource::open(path) {
        Ok(mut src) => src.frame_at(idx),
        Err(err) => {
            debug!("{}", err);
            None
        }
    }
}

/// Video writer that opens itself on the first frame, sized to that frame.
/// Released on drop.
pub struct FrameSink {
    writer: Option<videoio::VideoWriter>,
    size: Option<Size>,
    out_file: String,
    fourcc: [char; 4],
    fps: f64,
    written: u64,
}

impl FrameSink {
    pub fn new<S: ToString>(out_file: S, fourcc: &str, fps: f64) -> Self {
        let mut code = [' '; 4];
        for (slot, c) in code.iter_mut().zip(fourcc.chars()) {
            *slot = c;
        }

        Self {
            writer: None,
            size: None,
            out_file: out_file.to_string(),
            fourcc: code,
            // writers reject a zero rate
            fps: if fps > 0.0 { fps } else { 25.0 },
            written: 0,
        }
    }

    fn open(&mut self, size: Size) -> Result<(), Error> {
        let [a, b, c, d] = self.fourcc;
        let fourcc = videoio::VideoWriter::fourcc(a, b, c, d)?;
        let writer = videoio::VideoWriter::new(&self.out_file, fourcc, self.fps, size, true)?;
        if !writer.is_opened()? {
            return Err(Error::VideoOpen(self.out_file.clone()));
        }

        debug!("writing {} at {}x{} {} fps", self.out_file, size.width, size.height, self.fps);
        self.writer = Some(writer);
        self.size = Some(size);

        Ok(())
    }

    pub fn write(&mut self, frame: &Mat) -> Result<(), Error> {
        let size = Size::new(frame.cols(), frame.rows());
        match self.size {
            None => self.open(size)?,
            Some(s) if s != size => {
                return Err(Error::FrameSize {
                    expected: (s.width, s.height),
                    got: (size.width, size.height),
                })
            }
            Some(_) => (),
        }

        if let Some(writer) = self.writer.as_mut() {
            writer.write(frame)?;
            self.written += 1;
        }

        Ok(())
    }

    #[inline]
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn release(&mut self) {
        if let Some(mut w) = self.writer.take() {
            if let Err(err) = w.release() {
                warn!("releasing writer for {} failed: {}", self.out_file, err);
            }
        }
    }
}

impl Drop for FrameSink {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_video_does_not_open() {
        assert!(matches!(
            VideoSource::open("/missing.mp4"),
            Err(Error::VideoOpen(_))
        ));
        assert!(read_frame("/missing.mp4", 3).is_none());
    }

    #[test]
    fn sink_pads_short_fourcc() {
        let sink = FrameSink::new("/tmp/never-written.mp4", "mp4", 0.0);
        assert_eq!(sink.fourcc, ['m', 'p', '4', ' ']);
        assert_eq!(sink.fps, 25.0);
        assert_eq!(sink.written(), 0);
    }
}
