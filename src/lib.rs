//! Builds the `iam-secure` container image and launches it, with the host
//! side of the port mapping taken from a `.env` file.
//!
//! See [Provisioner] and the `iam_provision` binary.

mod command;
mod command_runner;
mod config;
mod error;
mod misc;
mod paths;
mod provisioner;
pub use command::*;
pub use config::*;
pub use error::*;
pub use misc::*;
pub use paths::*;
pub use provisioner::*;
/// This reexport helps with dependency wrangling
pub use stacked_errors;
