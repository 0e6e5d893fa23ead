//! Configuration layer for webhook-call.
//!
//! This module provides:
//! - In-memory defaults for every webhook call ([`WebhookConfig`])
//! - CLI argument parsing ([`Cli`], [`Command`])
//! - TOML configuration file parsing ([`TomlConfig`])
//! - Validated configuration ([`ValidatedConfig`])
//! - Configuration file generation ([`write_default_config`])
//! - Default values ([`defaults`])
//!
//! # Priority
//!
//! Configuration values are resolved with the following priority (highest to lowest):
//!
//! 1. **Explicit CLI arguments** - Values explicitly passed via command line
//! 2. **TOML config file** - Values from the configuration file
//! 3. **Built-in defaults** - See [`WebhookConfig`]
//!
//! `url` is required, and so is `secret` unless signing is turned off.
//!
//! Headers from the `[webhook.headers]` table are applied on top of the
//! default `Content-Type`, and `--header` flags on top of both. CLI tags
//! **replace** TOML tags entirely.
//!
//! # Boolean Flag Semantics
//!
//! Boolean flags (`--verify-ssl`, `--throw-on-failure`, `--no-sign`) use OR semantics:
//! - If set `true` in either CLI or TOML, the result is `true`.
//! - Once set `true` in TOML, CLI cannot override to `false` (flags only enable, not disable).
//!
//! # TOML-Only Options
//!
//! The backoff parameters (`backoff.base_delay`, `backoff.max_delay`,
//! `backoff.multiplier`), `webhook.connection`, `webhook.webhook_job` and
//! `queue.workers` are only available from a config file.

mod cli;
pub mod defaults;
mod error;
mod toml;
mod validated;
mod webhook;

#[cfg(test)]
mod validated_tests;

pub use cli::{Cli, Command};
pub use error::{ConfigError, field};
pub use toml::{
    BackoffSection, QueueSection, TargetSection, TomlConfig, WebhookSection,
    default_config_template,
};
pub use validated::{ValidatedConfig, expand_tilde, write_default_config};
pub use webhook::WebhookConfig;
