//! Worker Pool (WP) and Pipeline Runner (R), spec §4.2/§4.4: bounded
//! concurrency over leased jobs, each run through the strict F -> S -> W
//! -> P -> delete-remote stage order.

pub mod runner;
pub mod worker;

pub use runner::PipelineRunner;
pub use worker::WorkerPool;
