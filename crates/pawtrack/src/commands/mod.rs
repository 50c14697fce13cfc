//! Command dispatch: bridges CLI args -> tracker calls -> output formatting.

pub mod config_cmd;
pub mod device;
pub mod geofence;
pub mod notifications;
pub mod pets;
pub mod resolve;
pub mod status;
pub mod telemetry;
pub mod util;
pub mod watch;

use pawtrack_core::Tracker;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, tracker: &Tracker, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(tracker, args, global).await,
        Command::Status(args) => status::handle(tracker, args, global).await,
        Command::Resolve(args) => resolve::handle(tracker, args, global).await,
        Command::Pets(args) => pets::handle(tracker, args, global).await,
        Command::History(args) => telemetry::history(tracker, args, global).await,
        Command::Stats(args) => telemetry::stats(tracker, args, global).await,
        Command::Notifications(args) => notifications::handle(tracker, args, global).await,
        Command::Find(args) => device::find(tracker, args, global).await,
        Command::Assign(args) => device::assign(tracker, args, global).await,
        // Handled before a tracker is built
        Command::Geofence(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
