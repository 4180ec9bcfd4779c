use std::error::Error;
use std::thread;

use itertools::{Itertools, MinMaxResult};
use log::info;

use tensor_inpaint::image::{psnr, relative_error, synthetic};
use tensor_inpaint::initial_guess::mean_fill;
use tensor_inpaint::mask::{erase_block, random_erasure};
use tensor_inpaint::print_image::print_image;
use tensor_inpaint::{solve, Mode, SamplingOperator, Solution, SolverConfig};

const IMAGE_SIZE: usize = 96;
const ERASE_RATIO: f64 = 0.5;
const MASK_SEED: u64 = 2022;
// fractional (rows, cols) of an additional fully erased block, if any
const ERASED_BLOCK: Option<((f64, f64), (f64, f64))> = None;
const PREVIEW_STRIDE: usize = 3;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("config: {}", path);
            SolverConfig::from_json_file(path)?
        }
        None => SolverConfig::default(),
    };
    println!("{}", serde_json::to_string_pretty(&config)?);

    let original = synthetic(IMAGE_SIZE, IMAGE_SIZE);
    let mut mask = random_erasure(IMAGE_SIZE, IMAGE_SIZE, ERASE_RATIO, MASK_SEED);
    if let Some((rows, cols)) = ERASED_BLOCK {
        erase_block(&mut mask, rows, cols);
    }
    let sampling = SamplingOperator::from_pixel_mask(&mask);
    let initial = mean_fill(&original, &sampling)?;
    println!(
        "image {}x{}x3, {:.1}% of entries erased",
        IMAGE_SIZE,
        IMAGE_SIZE,
        sampling.erased_ratio() * 100.0
    );

    // both runs only read the mask, so they can go side by side
    let (static_run, inertial_run) = thread::scope(|scope| {
        let static_handle = scope.spawn(|| {
            solve(
                initial.clone(),
                &sampling,
                config.clone().with_mode(Mode::Static),
            )
        });
        let inertial_handle = scope.spawn(|| {
            solve(
                initial.clone(),
                &sampling,
                config.clone().with_mode(Mode::Inertial),
            )
        });
        (static_handle.join(), inertial_handle.join())
    });
    let static_run = static_run.map_err(|_| "static solve panicked")??;
    let inertial_run = inertial_run.map_err(|_| "inertial solve panicked")??;

    println!("Corrupted image:");
    print_image(&sampling.apply(&original)?, PREVIEW_STRIDE);
    println!("Reconstruction (inertial):");
    print_image(&inertial_run.image, PREVIEW_STRIDE);

    println!(
        "\n{:<10} {:>10} {:>10} {:>10} {:>10} {:>24}",
        "mode", "state", "its", "time ms", "psnr dB", "relative change range"
    );
    for (name, run) in [("static", &static_run), ("inertial", &inertial_run)] {
        print_row(name, run, &original)?;
    }
    println!(
        "initial guess psnr: {:.2} dB",
        psnr(&initial, &original, 1.0)?
    );

    Ok(())
}

fn print_row(
    name: &str,
    run: &Solution,
    original: &ndarray::Array3<f64>,
) -> Result<(), Box<dyn Error>> {
    let range = match run.history.iter().minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::NoElements => "-".to_string(),
        MinMaxResult::OneElement(v) => format!("{:.2e}", v),
        MinMaxResult::MinMax(lo, hi) => format!("{:.2e} .. {:.2e}", lo, hi),
    };
    let state = match run.state {
        tensor_inpaint::SolveState::Converged => "converged",
        _ => "budget",
    };
    println!(
        "{:<10} {:>10} {:>10} {:>10} {:>10.2} {:>24}",
        name,
        state,
        run.iterations,
        run.elapsed.as_millis(),
        psnr(&run.image, original, 1.0)?,
        range
    );
    info!(
        "{}: relative error {:.4}, last residuals [{}]",
        name,
        relative_error(&run.image, original)?,
        run.history
            .iter()
            .rev()
            .take(5)
            .map(|r| format!("{:.2e}", r))
            .join(", ")
    );
    Ok(())
}
