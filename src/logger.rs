//! Logger setup shared by both binaries.

use log::LevelFilter;

/// Initializes `env_logger` at `level`; `verbose` forces debug output.
pub fn init_logger(level: LevelFilter, verbose: bool) {
    env_logger::Builder::new()
        .filter_level(if verbose { LevelFilter::Debug } else { level })
        .init();
}
