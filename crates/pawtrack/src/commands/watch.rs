//! `watch <pet>`: live merged view until Ctrl-C or session loss.

use chrono::Local;

use pawtrack_core::{PetView, Tracker};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::status::{self, ViewReport};
use super::util;

pub async fn handle(tracker: &Tracker, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let pet = util::pet_id(&args.pet)?;
    let view = if args.no_push {
        tracker.observe_polled(pet)?
    } else {
        tracker.observe(pet)?
    };

    let color = output::should_color(&global.color);
    let mut watcher = view.watcher();
    let mut session = tracker.session().subscribe();
    let mut last = String::new();

    let mut emit = |view: &PetView| {
        let rendered = status::render(&ViewReport::capture(view, false), global, color);
        if rendered == last {
            return;
        }
        let framed = match global.output {
            OutputFormat::Table => format!(
                "{}\n{rendered}\n",
                output::dim(&format!("── {} ──", Local::now().format("%H:%M:%S")), color)
            ),
            _ => rendered.clone(),
        };
        output::print_output(&framed, global.quiet);
        last = rendered;
    };

    emit(&view);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = session.changed() => {
                if changed.is_err() {
                    break;
                }
                util::ensure_session(tracker.session())?;
            }
            more = watcher.changed() => {
                if !more {
                    break;
                }
                emit(&view);
            }
        }
    }

    tracing::debug!(pet = %view.pet(), "watch finished");
    Ok(())
}
