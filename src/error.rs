use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("Config Error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("unable to open video `{0}`")]
    VideoOpen(String),

    #[error("frame size changed from {expected:?} to {got:?}")]
    FrameSize { expected: (i32, i32), got: (i32, i32) },

    #[error("unsupported raster layout: {channels} channels")]
    RasterLayout { channels: i32 },
}
