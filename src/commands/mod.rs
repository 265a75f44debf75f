//! Command implementations for the geodex CLI

mod ingest;
mod init;
mod serve;
mod status;

pub use ingest::{cmd_ingest, print_ingest_stats, IngestOptions, IngestStats, SkipRecord};
pub use init::cmd_init;
pub use serve::cmd_serve;
pub use status::{cmd_status, print_status, CollectionStatus, StatusInfo};
