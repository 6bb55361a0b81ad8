//! Claude Code CLI
//!
//! Drives the Claude Code agent from the command line, serves a small set of
//! in-process tools to it, and forwards a structured record of every session
//! event to Braintrust over OTLP/HTTP.
//!
//! The pure core (`model`, `parser`, `tools`) has no I/O. The `sdk`,
//! `telemetry` and `command` modules form the impure shell.

pub mod command;
pub mod config;
pub mod logging;
pub mod model;
pub mod parser;
pub mod sdk;
pub mod telemetry;
pub mod tools;
