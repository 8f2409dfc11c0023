//! Enhance a 4-channel recording from the command line.
//!
//! ```text
//! cargo run --release --example enhance_file -- input.wav [iterations] [output.wav] [mask_dir]
//! ```
//!
//! Set `RUST_LOG=debug` to see the per-iteration EM objective.

use cgmm_mvdr::cgmm::IterationStats;
use cgmm_mvdr::enhance::{EnhanceConfig, enhance_with_observer};
use cgmm_mvdr::io;
use log::info;
use ndarray::Array2;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .ok_or("usage: enhance_file <input> [iterations] [output.wav] [mask_dir]")?;
    let iterations: usize = match args.next() {
        Some(n) => n.parse()?,
        None => EnhanceConfig::default().iterations,
    };
    let output = args.next().unwrap_or_else(|| "enhanced.wav".to_string());
    let mask_dir = args.next();

    let (audio, spec) = io::load(&input)?;
    info!(
        "{input}: {} channels, {} samples, {} Hz",
        spec.channels,
        audio.ncols(),
        spec.sample_rate
    );

    let config = EnhanceConfig::with_iterations(iterations);
    let result = enhance_with_observer(&audio, &config, &mut |stats: &IterationStats| {
        info!(
            "epoch {:2}: Q = {:.5} (noise {:.5}, noisy {:.5})",
            stats.iteration,
            stats.total(),
            stats.noise,
            stats.noisy
        );
    })?;

    let mono = Array2::from_shape_vec((1, result.signal.len()), result.signal)?;
    io::save_wav(&output, &mono, spec.sample_rate)?;
    info!("wrote {output}");

    if let Some(dir) = mask_dir {
        result.masks.save(&dir)?;
        info!("wrote masks to {dir}");
    }

    Ok(())
}
