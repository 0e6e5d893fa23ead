//! webhook-call: signed, retryable outbound webhook calls
//!
//! A library for building webhook calls, signing their payloads and
//! delivering them with configurable retry and backoff behavior, either
//! in the foreground or through an in-process queue.

pub mod config;
pub mod time;
pub mod webhook;
