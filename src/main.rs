use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use mocap_recorder::{
    euler_track, generate_csv, rotation_deltas, save_recording, ExportOptions, OrientationData,
};

#[derive(Parser, Debug)]
#[command(name = "mocap_recorder")]
#[command(about = "Orientation math and recording export for motion capture sessions", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print Euler angles (CSV) for a JSON array of orientation samples
    Euler {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
    },

    /// Print the relative rotation between consecutive samples (JSON)
    Deltas {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
    },

    /// Bundle a video file and its orientation samples into a zip archive
    Export {
        /// Recorded video file
        #[arg(long, value_name = "FILE")]
        video: PathBuf,

        /// JSON array of orientation samples, one per video frame
        #[arg(long, value_name = "FILE")]
        samples: PathBuf,

        /// JSON export options; flags below override it
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Archive name prefix
        #[arg(long)]
        tag: Option<String>,

        /// Extension of the video entry inside the archive
        #[arg(long)]
        video_ext: Option<String>,
    },
}

fn load_samples(path: &Path) -> Result<Vec<OrientationData>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading samples from {}", path.display()))?;
    let samples: Vec<OrientationData> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing samples in {}", path.display()))?;
    log::info!("Loaded {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

fn load_options(path: Option<&Path>) -> Result<ExportOptions> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            ExportOptions::from_json(&raw)
                .with_context(|| format!("loading config {}", path.display()))
        }
        None => Ok(ExportOptions::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Euler { input } => {
            let samples = load_samples(&input)?;
            print!("{}", generate_csv(&euler_track(&samples)));
        }
        Command::Deltas { input } => {
            let samples = load_samples(&input)?;
            let deltas = rotation_deltas(&samples);
            println!("{}", serde_json::to_string_pretty(&deltas)?);
        }
        Command::Export {
            video,
            samples,
            config,
            output_dir,
            tag,
            video_ext,
        } => {
            let mut options = load_options(config.as_deref())?;
            if let Some(dir) = output_dir {
                options.output_dir = dir;
            }
            if let Some(tag) = tag {
                options.tag = tag;
            }
            if let Some(ext) = video_ext {
                options.video_extension = ext;
            }

            let video_bytes = tokio::fs::read(&video)
                .await
                .with_context(|| format!("reading video {}", video.display()))?;
            let records = euler_track(&load_samples(&samples)?);

            let path = save_recording(vec![video_bytes], records, options)
                .await
                .context("saving recording archive")?;
            println!("{}", path.display());
        }
    }

    Ok(())
}
