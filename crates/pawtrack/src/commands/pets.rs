//! Pet command handlers.

use tabled::Tabled;

use pawtrack_core::{Pet, Tracker};

use crate::cli::{GlobalOpts, PetsArgs, PetsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct PetRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Species")]
    species: String,
    #[tabled(rename = "Breed")]
    breed: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Collar")]
    collar: String,
}

impl From<&Pet> for PetRow {
    fn from(p: &Pet) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            species: output::opt_str(p.species.as_deref()),
            breed: output::opt_str(p.breed.as_deref()),
            age: p.age.map_or_else(|| "-".into(), |a| a.to_string()),
            collar: p
                .device_id
                .as_ref()
                .map_or_else(|| "-".into(), ToString::to_string),
        }
    }
}

fn detail(p: &Pet) -> String {
    [
        format!("ID:      {}", p.id),
        format!("Name:    {}", p.name),
        format!("Species: {}", output::opt_str(p.species.as_deref())),
        format!("Breed:   {}", output::opt_str(p.breed.as_deref())),
        format!(
            "Age:     {}",
            p.age.map_or_else(|| "-".into(), |a| a.to_string())
        ),
        format!("Weight:  {}", output::opt_f64(p.weight, 1, " kg")),
        format!(
            "Collar:  {}",
            p.device_id
                .as_ref()
                .map_or_else(|| "-".into(), ToString::to_string)
        ),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(tracker: &Tracker, args: PetsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        PetsCommand::List => {
            let pets = tracker.list_pets().await?;
            let out = output::render_list(&global.output, &pets, |p| PetRow::from(p), |p| p.id.to_string());
            output::print_output(&out, global.quiet);
            Ok(())
        }
        PetsCommand::Show(pet) => {
            let pet = util::pet_id(&pet.pet)?;
            let pet = tracker.get_pet(&pet).await?;
            let out = output::render_single(&global.output, &pet, detail, |p| p.id.to_string());
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
