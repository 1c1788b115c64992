//! Config validation CLI tool
//!
//! Validates a momentsd configuration file and reports any errors.

use moments_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a momentsd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match moments_config::load_config(&config_path) {
        Ok(policy) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", moments_config::CURRENT_CONFIG_VERSION);
            println!("  Moments file: {}", policy.service.moments_path.display());
            println!("  Status file: {}", policy.service.status_path.display());
            println!("  Widget feed: {}", policy.service.widgets_path.display());
            println!("  Tick interval: {}s", policy.service.tick_interval.as_secs());
            println!(
                "  Session window: ({}s, {}s), min span {}s",
                policy.session.min_remaining.as_secs(),
                policy.session.max_remaining.as_secs(),
                policy.session.min_total.as_secs()
            );
            println!(
                "  Debounce: {}ms",
                policy.debounce.quiet_period.as_millis()
            );
            println!(
                "  Reminders: {}",
                if policy.reminders.enabled { "enabled" } else { "disabled" }
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                moments_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                moments_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                moments_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                moments_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        moments_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
