#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]

//! 铁口直断 — a fortune teller that *selects* verdicts instead of generating
//! them. The decision pipeline (features → state → verdict) is fully
//! deterministic; a leashed LLM may only retouch tone and rhythm afterwards,
//! and when it fails the fixed sentence goes out as-is.

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod gateway;
pub mod providers;
pub mod security;
pub mod state;
pub mod store;
pub mod verdicts;

pub use config::Config;
pub use error::{Result, TiekouError};
