//! `status <pet>`: one-shot polled view, plus the report shared with `watch`.

use std::fmt::Write;
use std::time::Duration;

use serde::Serialize;

use pawtrack_core::{
    CurrentView, DeviceId, GeofenceReport, LinkPhase, PetView, Source, TelemetryStats, Tracker,
};

use crate::cli::{GlobalOpts, PetArg};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Report ──────────────────────────────────────────────────────────

/// Everything printed for one pet at one instant.
#[derive(Debug, Serialize)]
pub struct ViewReport {
    #[serde(flatten)]
    pub view: CurrentView,
    pub device: Option<DeviceId>,
    pub geofence: Option<GeofenceReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<TelemetryStats>,
}

impl ViewReport {
    pub fn capture(view: &PetView, with_stats: bool) -> Self {
        let current = view.current_view();
        let geofence = current
            .location
            .as_ref()
            .map(|loc| pawtrack_core::geofence::evaluate(loc.value.coordinate, view.zones()));
        let stats = if with_stats {
            view.stats().data.map(|s| (*s).clone())
        } else {
            None
        };
        Self {
            view: current,
            device: view.device(),
            geofence,
            stats,
        }
    }
}

fn source(s: Source) -> &'static str {
    match s {
        Source::Push => "push",
        Source::Poll => "poll",
    }
}

fn phase(p: &LinkPhase) -> String {
    match p {
        LinkPhase::Disconnected => "disconnected".into(),
        LinkPhase::Connecting => "connecting".into(),
        LinkPhase::Connected => "connected".into(),
        LinkPhase::Reconnecting { attempt } => format!("reconnecting (attempt {attempt})"),
        LinkPhase::Closed => "closed".into(),
    }
}

/// Human-readable block for table output.
pub fn detail(r: &ViewReport, color: bool) -> String {
    let mut out = String::new();
    let v = &r.view;

    let _ = writeln!(out, "Pet:          {}", v.pet);
    let _ = writeln!(
        out,
        "Collar:       {}",
        r.device
            .as_ref()
            .map_or_else(|| output::dim("no active device", color), ToString::to_string)
    );
    let _ = writeln!(
        out,
        "Push:         {}",
        output::status(&phase(&v.connectivity.phase), v.connectivity.connected(), color)
    );
    if let Some(at) = v.connectivity.last_event_at {
        let _ = writeln!(out, "Last event:   {}", at.format("%H:%M:%S"));
    }

    match v.telemetry {
        Some(ref t) => {
            let s = &t.value;
            let _ = writeln!(
                out,
                "Heart rate:   {}  {}",
                output::opt_f64(s.heart_rate, 0, " bpm"),
                output::dim(source(t.source), color)
            );
            let _ = writeln!(out, "Temperature:  {}", output::opt_f64(s.temperature, 1, " °C"));
            let _ = writeln!(out, "Activity:     {}", output::opt_f64(s.activity_level, 1, ""));
            let _ = writeln!(out, "Battery:      {}", output::opt_f64(s.battery_level, 0, "%"));
            let _ = writeln!(out, "Measured at:  {}", s.timestamp.format("%Y-%m-%d %H:%M:%S"));
        }
        None => {
            let _ = writeln!(out, "Telemetry:    {}", output::dim("none yet", color));
        }
    }

    match v.location {
        Some(ref l) => {
            let c = l.value.coordinate;
            let _ = writeln!(
                out,
                "Location:     {:.5}, {:.5}{}  {}",
                c.latitude,
                c.longitude,
                l.value
                    .accuracy
                    .map_or_else(String::new, |a| format!(" ±{a:.0} m")),
                output::dim(source(l.source), color)
            );
        }
        None => {
            let _ = writeln!(out, "Location:     {}", output::dim("unknown", color));
        }
    }

    if let Some(ref g) = r.geofence {
        let line = if g.inside_any() {
            let names: Vec<&str> = g.inside.iter().map(String::as_str).collect();
            output::status(&format!("inside {}", names.join(", ")), true, color)
        } else {
            output::status("outside all zones", false, color)
        };
        let _ = writeln!(out, "Geofence:     {line}");
        for d in &g.distances {
            let _ = writeln!(out, "  {:<12}{:>8.0} m", d.zone, d.distance_m);
        }
    }

    if let Some(ref s) = r.stats {
        let _ = writeln!(out);
        let _ = write!(out, "{}", super::telemetry::stats_detail(s));
    }

    out.trim_end().to_owned()
}

pub fn render(report: &ViewReport, global: &GlobalOpts, color: bool) -> String {
    output::render_single(
        &global.output,
        report,
        |r| detail(r, color),
        |r| {
            r.view.location.as_ref().map_or_else(String::new, |l| {
                format!("{},{}", l.value.coordinate.latitude, l.value.coordinate.longitude)
            })
        },
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(tracker: &Tracker, args: PetArg, global: &GlobalOpts) -> Result<(), CliError> {
    let pet = util::pet_id(&args.pet)?;
    let view = tracker.observe_polled(pet)?;

    let limit = tracker.config().timeout;
    let bar = util::spinner("Loading pet state...", global);
    let settled = tokio::time::timeout(limit, view.settled()).await;
    bar.finish_and_clear();

    util::ensure_session(tracker.session())?;
    if settled.is_err() {
        return Err(CliError::Timeout {
            millis: millis(limit),
        });
    }

    let telemetry = view.telemetry_state();
    if let (None, Some(e)) = (telemetry.data, telemetry.error) {
        return Err(e.into());
    }

    let report = ViewReport::capture(&view, true);
    let color = output::should_color(&global.color);
    output::print_output(&render(&report, global, color), global.quiet);
    Ok(())
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
