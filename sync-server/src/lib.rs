//! Vendor sync server
//!
//! Pulls product feeds from independent suppliers into one canonical
//! catalog, tracks each vendor's sync job and records shipment notices for
//! submitted orders.
//!
//! # Module layout
//!
//! ```text
//! sync-server/src/
//! ├── gate/       # outbound request limiter (FIFO, clearable)
//! ├── feed/       # FeedNormalizer seam, HTTP JSON adapter, vendor registry
//! ├── catalog/    # UPC validation, quality scoring, conservative merge
//! ├── sync/       # per-vendor state machine jobs and the scheduler
//! ├── asn/        # order response reconciliation into ASNs
//! ├── recovery.rs # startup reset of interrupted jobs
//! ├── db/         # Store trait and redb backend
//! ├── api/        # operator HTTP routes
//! ├── core/       # config, state, server, background tasks
//! └── utils/      # logging
//! ```

pub mod api;
pub mod asn;
pub mod catalog;
pub mod core;
pub mod db;
pub mod feed;
pub mod gate;
pub mod recovery;
pub mod sync;
pub mod utils;

pub use self::core::{Config, Server, ServerError, ServerState};
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

/// Load `.env`, create the work directories and start logging
pub fn setup_environment() -> anyhow::Result<Config> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.work_dir)?;

    let log_dir = config.log_dir();
    let log_dir = log_dir.to_string_lossy();
    init_logger_with_file(&config.log_level, config.log_json, Some(&log_dir))?;

    Ok(config)
}
