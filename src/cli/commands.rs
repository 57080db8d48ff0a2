//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use log::{info, warn};

use crate::config::JobConfig;
use crate::engine::{export_pcm, import_pcm, LogProgress, Reconstructor};
use crate::error::Result;
use crate::schedule::Speed;

/// Reconstruct the audio described by a job file.
pub fn render(job_path: &Path, output: Option<&Path>, parallel: bool) -> Result<()> {
    info!("Loading job: {}", job_path.display());

    let job = JobConfig::load(job_path)?;
    let timeline = job.timeline()?;
    let schedule = job.schedule()?;
    let speeds = job.speed_table()?;

    info!("Decoding source: {}", job.source.display());
    let source = import_pcm(&job.source)?;

    let reconstructor = Reconstructor::default().with_parallel(parallel || job.parallel);
    info!(
        "Stretching with {} ({} chunks)",
        reconstructor.stretcher().name(),
        schedule.len()
    );
    let mut progress = LogProgress::new("Creating new audio");
    let audio = reconstructor.run(
        &source,
        &schedule,
        &speeds,
        job.frame_rate,
        &mut progress,
    )?;

    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| job.output_path());
    export_pcm(&audio, &output_path)?;

    let expected = timeline.duration_secs();
    let actual = audio.duration_secs();
    if (expected - actual).abs() > 1.0 / job.frame_rate.as_f64() {
        warn!(
            "Audio is {:.3}s but the timeline is {:.3}s long",
            actual, expected
        );
    }

    println!("Audio written: {}", output_path.display());
    println!("Duration: {:.3}s ({} sample frames)", actual, audio.len());

    Ok(())
}

/// Print the timeline aggregates and schedule summary of a job.
pub fn inspect(job_path: &Path) -> Result<()> {
    info!("Inspecting job: {}", job_path.display());

    let job = JobConfig::load(job_path)?;
    let timeline = job.timeline()?;
    let schedule = job.schedule()?;
    let speeds = job.speed_table()?;

    let (mut kept, mut dropped, mut stretched) = (0usize, 0usize, 0usize);
    for index in 0..schedule.len() {
        match schedule.speed_of(index, &speeds)? {
            Speed::Drop => dropped += 1,
            speed if speed.is_unity() => kept += 1,
            Speed::Keep(_) => stretched += 1,
        }
    }

    println!("Source: {}", job.source.display());
    println!("Timebase: {} fps", timeline.timebase);
    println!("Sample rate: {} Hz", timeline.sample_rate);
    println!("Resolution: {}", timeline.resolution);
    println!("Background: {}", timeline.background);
    println!();
    println!(
        "Chunks: {} ({} kept, {} stretched, {} dropped)",
        schedule.len(),
        kept,
        stretched,
        dropped
    );
    println!("Source frames: {}", schedule.total_frames());
    println!("Output frames: {:.2}", schedule.output_frames(&speeds)?);
    println!();
    println!(
        "Layers: {} visual, {} audio",
        timeline.visual_layers().len(),
        timeline.audio_layers().len()
    );
    println!("Sources:");
    for (id, info) in timeline.sources() {
        println!("  {}: {}", id, info.path.display());
    }
    println!("End: {} frames", timeline.end());
    println!(
        "Length: {:.2} frames ({:.3}s)",
        timeline.out_len(),
        timeline.duration_secs()
    );

    Ok(())
}
