//! `history` and `stats`: telemetry passthroughs.

use tabled::Tabled;

use pawtrack_core::{TelemetrySample, TelemetryStats, Tracker};

use crate::cli::{GlobalOpts, HistoryArgs, StatsArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Heart")]
    heart: String,
    #[tabled(rename = "Temp")]
    temp: String,
    #[tabled(rename = "Activity")]
    activity: String,
    #[tabled(rename = "Battery")]
    battery: String,
}

impl From<&TelemetrySample> for SampleRow {
    fn from(s: &TelemetrySample) -> Self {
        Self {
            time: s.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            heart: output::opt_f64(s.heart_rate, 0, " bpm"),
            temp: output::opt_f64(s.temperature, 1, " °C"),
            activity: output::opt_f64(s.activity_level, 1, ""),
            battery: output::opt_f64(s.battery_level, 0, "%"),
        }
    }
}

pub async fn history(
    tracker: &Tracker,
    args: HistoryArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let pet = util::pet_id(&args.pet)?;
    let samples = tracker.telemetry_history(&pet, args.limit).await?;
    let out = output::render_list(&global.output, &samples, |s| SampleRow::from(s), |s| {
        s.timestamp.to_rfc3339()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

pub fn stats_detail(s: &TelemetryStats) -> String {
    [
        format!("Avg heart rate:  {}", output::opt_f64(s.avg_heart_rate, 1, " bpm")),
        format!("Avg temperature: {}", output::opt_f64(s.avg_temperature, 2, " °C")),
        format!("Avg activity:    {}", output::opt_f64(s.avg_activity, 2, "")),
        format!(
            "Data points:     {}",
            s.data_points.map_or_else(|| "-".into(), |n| n.to_string())
        ),
    ]
    .join("\n")
}

pub async fn stats(tracker: &Tracker, args: StatsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let pet = util::pet_id(&args.pet)?;
    let stats = tracker.telemetry_stats(&pet, args.hours).await?;
    let out = output::render_single(&global.output, &stats, stats_detail, |s| {
        s.data_points.unwrap_or_default().to_string()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
