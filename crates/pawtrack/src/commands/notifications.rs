//! `notifications [--unread]`.

use tabled::Tabled;

use pawtrack_core::{Notification, Tracker};

use crate::cli::{GlobalOpts, NotificationsArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct NotificationRow {
    #[tabled(rename = "When")]
    when: String,
    #[tabled(rename = "Pet")]
    pet: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Title")]
    title: String,
}

impl From<&Notification> for NotificationRow {
    fn from(n: &Notification) -> Self {
        Self {
            when: n
                .created_at
                .map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M").to_string()),
            pet: output::opt_str(n.pet_name.as_deref()),
            priority: output::opt_str(n.priority.as_deref()),
            title: output::opt_str(n.title.as_deref()),
        }
    }
}

pub async fn handle(
    tracker: &Tracker,
    args: NotificationsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.unread {
        let state = tracker.unread_count()?.get().await;
        let unread = util::query_data(state, "unread count")?;
        let out = output::render_single(
            &global.output,
            unread.as_ref(),
            |u| format!("{} unread", u.count),
            |u| u.count.to_string(),
        );
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    let state = tracker.notifications()?.get().await;
    let rows = util::query_data(state, "notifications")?;
    let out = output::render_list(&global.output, rows.as_slice(), |n| NotificationRow::from(n), |n| {
        n.id.clone().unwrap_or_default()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
