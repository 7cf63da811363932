//! Terminal views and commands

pub mod rates;
pub mod setup;
pub mod trend;
pub mod ui;
pub mod watch;
