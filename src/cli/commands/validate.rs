//! Validate command implementation

use crate::cli::{log, LogLevel, ValidateArgs};
use crate::config::FlopConfig;

/// Format the encoder and gate settings as a string
pub fn format_model_info(config: &FlopConfig) -> String {
    let encoder = config.encoder();
    let support = config.support();
    let mut lines = vec![
        format!(
            "  Encoder: {} layers, hidden {}, intermediate {}, {} heads",
            encoder.num_hidden_layers,
            encoder.hidden_size,
            encoder.intermediate_size,
            encoder.num_attention_heads
        ),
        format!(
            "  Support: limit_l {}, limit_r {}, beta {}, eps {}",
            support.limit_l(),
            support.limit_r(),
            support.beta(),
            support.eps()
        ),
    ];
    if config.factorize() {
        let dims = config.pruned_layers_dim();
        lines.push(format!(
            "  Factorized: {} projections, {} kept units",
            dims.len(),
            dims.total_width()
        ));
    } else {
        lines.push(format!(
            "  Gated: {} projections",
            encoder.projection_ids().count()
        ));
    }
    lines.join("\n")
}

/// Format the sparsity controller settings as a string
pub fn format_controller_info(config: &FlopConfig) -> String {
    [
        format!(
            "  Target sparsity: {} (warmup {} steps)",
            config.target_sparsity(),
            config.target_sparsity_warmup()
        ),
        format!("  Regularization scale: {}", config.regularization_scale()),
        format!(
            "  Ascent rates: lambda {}, alpha {} (warmup {} steps)",
            config.lambda_learning_rate(),
            config.alpha_learning_rate(),
            config.learning_rate_warmup()
        ),
        format!(
            "  Optimizer: AdamW lr {}, weight decay {}",
            config.learning_rate(),
            config.weight_decay()
        ),
    ]
    .join("\n")
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Validating config: {}", args.config.display()),
    );

    let config = FlopConfig::from_file(&args.config).map_err(|e| format!("Validation failed: {e}"))?;

    log(level, LogLevel::Normal, "Configuration is valid");

    if args.detailed {
        log(level, LogLevel::Normal, &format_model_info(&config));
        log(level, LogLevel::Normal, &format_controller_info(&config));
    }

    Ok(())
}
