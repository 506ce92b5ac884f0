use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use opencv::{core::Vector, imgcodecs};
use tracing::info;
use tracing_subscriber::EnvFilter;

use courtside::{probe_metadata, RenderOptions, Session, Settings};

#[derive(Parser)]
#[command(name = "courtside", version)]
#[command(about = "Overlay review for pre-computed basketball video analytics")]
struct Cli {
    /// Config file basename (toml, yaml or json)
    #[arg(long, default_value = "courtside")]
    config: String,

    #[command(flatten)]
    paths: PathArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct PathArgs {
    #[arg(long, global = true)]
    video: Option<PathBuf>,
    #[arg(long, global = true)]
    detections: Option<PathBuf>,
    #[arg(long, global = true)]
    tracks: Option<PathBuf>,
    #[arg(long, global = true)]
    shoes: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print container metadata of the video
    Info {
        #[arg(long)] json: bool,
    },

    /// Detection, track and shoe statistics
    Stats {
        #[arg(short, long)] frame: Option<u64>,
        #[arg(long)] min_confidence: Option<f32>,
        #[arg(long)] json: bool,
    },

    /// Render one frame with overlays to an image file
    Frame {
        index: u64,
        #[arg(short, long)] output: PathBuf,
        #[arg(long)] no_detections: bool,
        #[arg(long)] no_tracks: bool,
        #[arg(long)] no_trails: bool,
        #[arg(long)] no_roi: bool,
        #[arg(long)] no_shoes: bool,
        #[arg(long)] legend: bool,
        #[arg(long)] min_confidence: Option<f32>,
    },

    /// Burn overlays into the whole video
    Export {
        #[arg(short, long)] output: PathBuf,
        #[arg(long)] no_roi: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("courtside=info,warn")),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let mut cfg = Settings::load_from(&cli.config).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        Settings::with_default_masks()
    });

    if let Some(p) = cli.paths.video      { cfg.paths.video = p; }
    if let Some(p) = cli.paths.detections { cfg.paths.detections = p; }
    if let Some(p) = cli.paths.tracks     { cfg.paths.tracks = p; }
    if let Some(p) = cli.paths.shoes      { cfg.paths.shoes = p; }

    match cli.command {
        Command::Info { json } => {
            let meta = probe_metadata(&cfg.paths.video);
            if json {
                println!("{}", serde_json::to_string_pretty(&meta)?);
            } else {
                println!("file       {}", cfg.paths.video.display());
                println!("size       {}x{}", meta.width, meta.height);
                println!("fps        {:.3}", meta.fps);
                println!("frames     {}", meta.frame_count);
                println!("duration   {:.1} s", meta.duration);
                println!("codec      {}", meta.codec);
                println!("container  {}", meta.container);
                println!("bitrate    {} bit/s", meta.bitrate);
            }
        }

        Command::Stats { frame, min_confidence, json } => {
            let session = Session::load(&cfg);
            let min_confidence = min_confidence.or(cfg.render.min_confidence);

            if let Some(idx) = frame {
                let stats = session.frame_stats(idx, min_confidence);
                if json {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    println!("frame {}", stats.frame);
                    println!("  detections  {}", stats.detections);
                    println!("  tracks      {}", stats.tracks);
                    println!("  avg/frame   {:.2}", stats.avg_detections_per_frame);
                    for line in stats.shoes.lines() {
                        println!("  {}", line);
                    }
                    for label in session.shoes().labels_for_frame(idx) {
                        match label.confidence {
                            Some(conf) => println!("  track {:<5} {} {:.2}", label.track_id, label.class, conf),
                            None => println!("  track {:<5} {}", label.track_id, label.class),
                        }
                    }
                }
            } else {
                let shoes = session.shoes().summarize_by_class(None);
                let avg = session.detections().average_count_per_frame(min_confidence);
                if json {
                    let doc = serde_json::json!({
                        "frames": session.frame_count(),
                        "avg_detections_per_frame": avg,
                        "track_points": session.tracks().tracks.len(),
                        "shoes": shoes,
                        "skipped": {
                            "detections": session.detections().skipped,
                            "tracks": session.tracks().skipped,
                            "shoes": session.shoes().skipped,
                        },
                    });
                    println!("{}", serde_json::to_string_pretty(&doc)?);
                } else {
                    println!("frames                 {}", session.frame_count());
                    println!("avg detections/frame   {:.2}", avg);
                    println!("track points           {}", session.tracks().tracks.len());
                    println!(
                        "skipped records        {} detections, {} tracks, {} shoes",
                        session.detections().skipped,
                        session.tracks().skipped,
                        session.shoes().skipped
                    );
                    for line in shoes.lines() {
                        println!("  {}", line);
                    }
                }
            }
        }

        Command::Frame {
            index,
            output,
            no_detections,
            no_tracks,
            no_trails,
            no_roi,
            no_shoes,
            legend,
            min_confidence,
        } => {
            let opts = RenderOptions {
                roi: cfg.render.roi && !no_roi,
                detections: cfg.render.detections && !no_detections,
                tracks: cfg.render.tracks && !no_tracks,
                trails: cfg.render.trails && !no_trails,
                shoe_labels: cfg.render.shoe_labels && !no_shoes,
                shoe_legend: cfg.render.shoe_legend || legend,
                min_confidence: min_confidence.or(cfg.render.min_confidence),
                ..cfg.render.clone()
            };

            let mut session = Session::load(&cfg);
            let Some(img) = session.render_frame(index, &opts) else {
                anyhow::bail!("frame {} of {} is not readable", index, cfg.paths.video.display());
            };

            if !imgcodecs::imwrite(&output.to_string_lossy(), &img, &Vector::new())? {
                anyhow::bail!("could not write {}", output.display());
            }
            info!("wrote frame {} to {}", index, output.display());
        }

        Command::Export { output, no_roi } => {
            let session = Session::load(&cfg);
            let every = cfg.export.log_every.max(1);
            let cancel = Arc::new(AtomicBool::new(false));

            let ok = session.export(&output, !no_roi, cancel, |idx, total| {
                if (idx + 1) % every == 0 || idx + 1 == total {
                    info!("frame {}/{}", idx + 1, total);
                }
            });

            if !ok {
                anyhow::bail!("export to {} failed", output.display());
            }
            info!("export written to {}", output.display());
        }
    }

    Ok(())
}
