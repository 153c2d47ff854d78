//! The Archiver (spec §4.3) and the thin inbound RPC facade in front of it
//! (spec §6): owns the Job Queue and Worker Pool lifecycle, and exposes
//! start/stop/reinitialize plus a log tail the way `pmoserver`'s `Server`
//! exposes `/log-sse` and `/log-dump` next to its own routes.

pub mod archiver;
pub mod facade;
pub mod logs;

pub use archiver::{Archiver, ArchiverConfig};
pub use facade::router;
pub use logs::{LogLayer, LogState};
