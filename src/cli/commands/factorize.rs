//! Factorize command implementation

use crate::checkpoint::Checkpoint;
use crate::cli::{log, FactorizeArgs, LogLevel};
use crate::config::FlopConfig;
use crate::encoder::PrunableEncoder;
use crate::factorize::PruningFactorizer;
use rand::rngs::StdRng;
use rand::SeedableRng;

pub fn run_factorize(args: FactorizeArgs, level: LogLevel) -> Result<(), String> {
    let config = FlopConfig::from_file(&args.config).map_err(|e| format!("Config error: {e}"))?;
    if config.factorize() {
        return Err("config is already in factorize mode; pass the gated training config".into());
    }
    let checkpoint =
        Checkpoint::load(&args.checkpoint).map_err(|e| format!("Failed to load checkpoint: {e}"))?;

    let mut encoder = PrunableEncoder::build(&config, &mut StdRng::seed_from_u64(config.seed()))
        .map_err(|e| e.to_string())?;
    let mut controller = config.controller().map_err(|e| e.to_string())?;
    checkpoint
        .restore(&mut encoder, &mut controller)
        .map_err(|e| format!("Checkpoint does not match config: {e}"))?;

    let factorizer = PruningFactorizer::new().with_threshold(args.threshold);
    let (compressed, widths) = factorizer.compress_encoder(&encoder).map_err(|e| e.to_string())?;

    for id in widths.zero_width_projections() {
        log(level, LogLevel::Normal, &format!("Warning: {id} pruned to width 0"));
    }
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "Parameters: {} -> {}",
            encoder.parameter_count(),
            compressed.parameter_count()
        ),
    );

    match &args.output {
        Some(path) => {
            widths.save(path).map_err(|e| format!("Failed to write widths: {e}"))?;
            log(
                level,
                LogLevel::Normal,
                &format!("Wrote {} widths to {}", widths.len(), path.display()),
            );
        }
        None => {
            let json = serde_json::to_string_pretty(&widths).map_err(|e| e.to_string())?;
            println!("{json}");
        }
    }

    if let Some(path) = &args.compressed {
        Checkpoint::capture(&compressed, &controller)
            .save(path)
            .map_err(|e| format!("Failed to write compressed checkpoint: {e}"))?;
        log(
            level,
            LogLevel::Normal,
            &format!("Wrote compressed checkpoint to {}", path.display()),
        );
    }

    Ok(())
}
