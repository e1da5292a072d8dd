pub mod commands;

pub use commands::{recipient_for, run, Command};
