//! Core infrastructure module.
//!
//! - [`types`]: scalar aliases and closed enumerations
//! - [`constants`]: defaults and reserved values
//! - [`error`]: the [`ForestError`] type and [`Result`] alias
//!
//! ```rust
//! use flat_forest::core::{
//!     types::{Activation, ConditionType},
//!     constants::DEFAULT_OUT_OF_VOCABULARY_CODE,
//!     error::{ForestError, Result},
//! };
//!
//! let activation = Activation::Sigmoid;
//! assert_eq!(ConditionType::IsIn.tag(), 1);
//! assert_eq!(DEFAULT_OUT_OF_VOCABULARY_CODE, 0);
//! # let _ = activation;
//! # Ok::<(), ForestError>(())
//! ```

pub mod constants;
pub mod error;
pub mod types;

pub use constants::*;
pub use error::{ForestError, Result};
pub use types::*;

use std::sync::atomic::{AtomicBool, Ordering};

static CORE_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize the logging subsystem.
///
/// Defaults `RUST_LOG` to `info` when unset. Safe to call repeatedly; a logger
/// installed by the host application is left in place.
pub fn initialize_core() -> Result<()> {
    if CORE_INITIALIZED.load(Ordering::Acquire) {
        return Ok(());
    }

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    // Fails only when another logger is already installed.
    let _ = env_logger::try_init();

    CORE_INITIALIZED.store(true, Ordering::Release);
    log::info!("flat-forest {} initialized", FLAT_FOREST_VERSION);
    log::debug!(
        "{} CPU cores available, rayon pool has {} threads",
        num_cpus::get(),
        rayon::current_num_threads()
    );
    Ok(())
}

/// Check if [`initialize_core`] has run.
pub fn is_core_initialized() -> bool {
    CORE_INITIALIZED.load(Ordering::Acquire)
}
