//! Example: track spots in a synthetic frame stack
//!
//! Renders a stack of noisy frames with a few diffusing Gaussian spots,
//! runs localization and linking, and writes the trajectory table and the
//! configuration used.
//!
//! Output:
//! ```text
//! test_output/
//!   trajectories.tsv
//!   track_synthetic.yaml
//!   logs/track_synthetic.*.log
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --example track_synthetic
//! ```

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spotrack::{write_tsv_file, Buffer2, Config, Tracker};

const WIDTH: usize = 96;
const HEIGHT: usize = 96;
const FRAMES: usize = 40;
const SPOTS: usize = 5;

const BACKGROUND: f64 = 300.0;
const NOISE_SIGMA: f64 = 6.0;
const SPOT_SIGMA: f64 = 1.4;
const SPOT_AMPLITUDE: f64 = 900.0;
/// Per-axis step standard deviation of the random walk, in pixels.
const STEP_SIGMA: f64 = 0.4;

const SEED: u64 = 0x5eed;

fn main() -> anyhow::Result<()> {
    let output_dir = Path::new("test_output");
    common::setup_logging("info", output_dir.join("logs"), "track_synthetic")?;

    let mut rng = StdRng::seed_from_u64(SEED);
    let tracks = random_walks(&mut rng);
    let frames: Vec<Buffer2<f32>> = (0..FRAMES).map(|f| render(&tracks, f, &mut rng)).collect();
    tracing::info!(frames = frames.len(), spots = SPOTS, "Rendered synthetic stack");

    let config = Config {
        max_displacement: 3.0,
        ..Config::default()
    };
    config.save(output_dir.join("track_synthetic.yaml"))?;

    let start = Instant::now();
    let result = Tracker::new(config)?.track(&frames, None)?;
    tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "Tracking finished");

    let diagnostics = &result.diagnostics;
    println!("Spots localized:      {}", diagnostics.total_spots());
    println!("Unconverged spots:    {}", diagnostics.unconverged());
    println!("Degraded frames:      {}", diagnostics.degraded_frames());
    println!("Trajectories created: {}", diagnostics.link.created);
    println!("Trajectories kept:    {}", diagnostics.link.kept);
    for t in result.trajectories.iter() {
        println!(
            "  #{:<3} frames {:>2}-{:<2} mean intensity {:.0}",
            t.id(),
            t.start_frame(),
            t.end_frame(),
            t.mean_intensity()
        );
    }

    let tsv = output_dir.join("trajectories.tsv");
    write_tsv_file(&result.trajectories, &tsv)
        .with_context(|| format!("writing {}", tsv.display()))?;
    println!("Wrote {}", tsv.display());

    Ok(())
}

/// One position per frame for every spot, kept away from the frame border.
fn random_walks(rng: &mut StdRng) -> Vec<Vec<(f64, f64)>> {
    let margin = 12.0;
    (0..SPOTS)
        .map(|_| {
            let mut x = margin + rng.random::<f64>() * (WIDTH as f64 - 2.0 * margin);
            let mut y = margin + rng.random::<f64>() * (HEIGHT as f64 - 2.0 * margin);
            (0..FRAMES)
                .map(|_| {
                    let p = (x, y);
                    x = (x + gaussian(rng) * STEP_SIGMA).clamp(margin, WIDTH as f64 - margin);
                    y = (y + gaussian(rng) * STEP_SIGMA).clamp(margin, HEIGHT as f64 - margin);
                    p
                })
                .collect()
        })
        .collect()
}

fn render(tracks: &[Vec<(f64, f64)>], frame: usize, rng: &mut StdRng) -> Buffer2<f32> {
    let two_sigma_sq = 2.0 * SPOT_SIGMA * SPOT_SIGMA;
    let mut image = Buffer2::from_fn(WIDTH, HEIGHT, |x, y| {
        let signal: f64 = tracks
            .iter()
            .map(|t| {
                let (cx, cy) = t[frame];
                let d_sq = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
                SPOT_AMPLITUDE * (-d_sq / two_sigma_sq).exp()
            })
            .sum();
        (BACKGROUND + signal) as f32
    });
    for p in image.pixels_mut() {
        *p = (*p as f64 + gaussian(rng) * NOISE_SIGMA).max(0.0) as f32;
    }
    image
}

/// Standard normal sample (Box-Muller).
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
