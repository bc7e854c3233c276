//! Process-level wiring: building the tracker from config, the watch loop,
//! Ctrl+C handling and the export command.

pub mod builder;
pub mod export;
pub mod shutdown;
pub mod watch;

pub use builder::{build_fetcher, build_notifier, build_tracker, BuildError, TrackerHandles};
pub use export::run_export_command;
pub use shutdown::setup_shutdown_handler;
pub use watch::{run_watch, WatchReport};
