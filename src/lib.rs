pub mod bbox;
pub mod compositor;
pub mod config;
pub mod detection;
pub mod error;
pub mod export;
pub mod history;
pub mod mask;
pub mod math;
pub mod palette;
pub mod probe;
pub mod raster;
pub mod session;
pub mod shoe;
pub mod text;
pub mod track;
pub mod video;

mod circular_queue;
mod value;

pub use compositor::{Compositor, Overlays};
pub use config::{RenderOptions, Settings};
pub use detection::{parse_detections, Detection, DetectionSet};
pub use error::Error;
pub use export::{export_with_overlays, ExportJob};
pub use history::TrailHistory;
pub use probe::{probe_metadata, VideoMetadata};
pub use session::{FrameStats, Session};
pub use shoe::{parse_shoe_labels, ShoeLabel, ShoeLabelSet, StaticShoeLabel};
pub use track::{parse_tracks, TrackPoint, TrackSet};
