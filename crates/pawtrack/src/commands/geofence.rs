//! `geofence <lat> <lng>`: evaluate a coordinate against configured zones.

use tabled::Tabled;

use pawtrack_core::{Coordinate, GeofenceReport, geofence};

use crate::cli::{GeofenceArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ZoneRow {
    #[tabled(rename = "Zone")]
    zone: String,
    #[tabled(rename = "Distance")]
    distance: String,
    #[tabled(rename = "Inside")]
    inside: String,
}

pub fn handle(args: &GeofenceArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let point = Coordinate::new(args.latitude, args.longitude);
    if !point.is_valid() {
        return Err(CliError::Validation {
            field: "coordinate".into(),
            reason: format!("({}, {}) is out of range", args.latitude, args.longitude),
        });
    }

    let zones = config::zones(global)?;
    let report = geofence::evaluate(point, &zones);
    let color = output::should_color(&global.color);

    let out = output::render_single(
        &global.output,
        &report,
        |r| table(r, color),
        |r| r.inside.iter().cloned().collect::<Vec<_>>().join("\n"),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Per-zone table for a report.
pub fn table(report: &GeofenceReport, color: bool) -> String {
    let rows: Vec<ZoneRow> = report
        .distances
        .iter()
        .map(|d| ZoneRow {
            zone: d.zone.clone(),
            distance: format!("{:.0} m", d.distance_m),
            inside: output::status(if d.inside { "yes" } else { "no" }, d.inside, color),
        })
        .collect();
    tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string()
}
