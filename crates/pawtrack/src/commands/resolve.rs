//! `resolve <pet>`: the active device for a pet.

use serde::Serialize;

use pawtrack_core::{DeviceId, PetId, Tracker};

use crate::cli::{GlobalOpts, PetArg};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct Resolution {
    pet: PetId,
    device: Option<DeviceId>,
}

pub async fn handle(tracker: &Tracker, args: PetArg, global: &GlobalOpts) -> Result<(), CliError> {
    let pet = util::pet_id(&args.pet)?;
    let device = tracker.resolve_device(&pet).await?;
    let resolution = Resolution { pet, device };

    let out = output::render_single(
        &global.output,
        &resolution,
        |r| match r.device {
            Some(ref d) => format!("{}: {d}", r.pet),
            None => format!("{}: no active device", r.pet),
        },
        |r| r.device.as_ref().map(ToString::to_string).unwrap_or_default(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
