//! Device-control commands: `find` and `assign`.

use pawtrack_core::{Command as CoreCommand, CommandResult, DeviceId, Tracker};

use crate::cli::{AssignArgs, GlobalOpts, PetArg};
use crate::error::CliError;
use crate::output;

use super::util;

fn print_ack(result: &CommandResult, fallback: &str, global: &GlobalOpts) {
    let out = output::render_single(
        &global.output,
        result,
        |r| r.message.clone().unwrap_or_else(|| fallback.to_owned()),
        |r| r.message.clone().unwrap_or_default(),
    );
    output::print_output(&out, global.quiet);
}

pub async fn find(tracker: &Tracker, args: PetArg, global: &GlobalOpts) -> Result<(), CliError> {
    let pet = util::pet_id(&args.pet)?;
    let result = tracker.execute(CoreCommand::FindPet { pet }).await?;
    print_ack(&result, "Find command sent", global);
    Ok(())
}

pub async fn assign(tracker: &Tracker, args: AssignArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let pet = util::pet_id(&args.pet)?;
    let result = tracker
        .execute(CoreCommand::AssignDevice {
            pet,
            device: DeviceId::from(args.device.as_str()),
        })
        .await?;
    print_ack(&result, "Collar assigned", global);
    Ok(())
}
