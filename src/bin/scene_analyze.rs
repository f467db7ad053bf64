//! scene_analyze - analyze a single image file and print the result
//!
//! One-shot counterpart to nearsightd for local inspection and calibration
//! work. Uses the same configuration sources as the daemon.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use nearsight_kernel::{AssistConfig, Engine, Frame};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image file to analyze (jpeg or png).
    image: PathBuf,
    /// Override the assumed horizontal field of view, in degrees.
    #[arg(long, env = "NEARSIGHT_FOV_DEGREES")]
    fov_degrees: Option<f64>,
    /// Override the depth-to-centimeters calibration factor.
    #[arg(long, env = "NEARSIGHT_DEPTH_SCALE")]
    depth_scale: Option<f64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = AssistConfig::load()?;
    if let Some(degrees) = args.fov_degrees {
        cfg.camera.horizontal_fov_degrees = degrees;
    }
    if let Some(scale_cm) = args.depth_scale {
        cfg.fusion.depth_scale_cm = scale_cm;
    }

    let bytes = fs::read(&args.image)
        .with_context(|| format!("failed to read {}", args.image.display()))?;
    let frame = Frame::decode(&bytes)?;

    let mut engine = Engine::from_config(&cfg)?;
    let analysis = engine.analyze(&frame)?;

    let mut results = Vec::new();
    for object in &analysis.objects {
        let distances = object.distance.display();
        results.push(serde_json::json!({
            "label": object.label,
            "confidence": object.confidence,
            "distances": distances,
        }));
    }
    let report = serde_json::json!({
        "results": results,
        "room": analysis.room,
        "scene_description": analysis.scene_description,
        "labels": analysis.labels,
        "detector": analysis.detector.as_str(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
