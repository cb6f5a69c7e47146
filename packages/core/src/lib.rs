// Library root: exposes internal modules for integration tests in `tests/`.
// Production entry point remains `src/main.rs`.

pub mod aggregation;
pub mod delivery;
pub mod error;
pub mod metrics;
pub mod polling;
pub mod providers;
pub mod scheduler;

// Bootstrap modules used by the binary. Declared pub so the config loader
// can be exercised from integration tests.
pub mod cli;
pub mod config;
pub mod logging;
