//! Tests for validated configuration.

use super::ConfigError;
use super::cli::Cli;
use super::toml::TomlConfig;
use super::validated::ValidatedConfig;

/// Helper to create CLI args from a slice
fn cli(args: &[&str]) -> Cli {
    let mut full_args = vec!["webhook-call"];
    full_args.extend(args);
    Cli::parse_from_iter(full_args)
}

/// Helper to parse TOML config
fn toml(content: &str) -> TomlConfig {
    TomlConfig::parse(content).unwrap()
}

/// CLI args with the two required values set.
fn cli_with_target(extra: &[&str]) -> Cli {
    let mut args = vec!["--url", "https://example.com/hook", "--secret", "shh"];
    args.extend(extra);
    cli(&args)
}
