//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use pawtrack_core::{CoreError, PetId, QueryState, SessionContext, SessionState};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Parse a pet id argument, rejecting blanks.
pub fn pet_id(raw: &str) -> Result<PetId, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::Validation {
            field: "pet".into(),
            reason: "pet id must not be empty".into(),
        });
    }
    Ok(PetId::from(trimmed))
}

/// Turn a settled query into its data, or the error that kept it empty.
pub fn query_data<T>(state: QueryState<T>, what: &str) -> Result<Arc<T>, CliError> {
    match (state.data, state.error) {
        (Some(data), _) => Ok(data),
        (None, Some(e)) => Err(e.into()),
        (None, None) => Err(CoreError::Internal(format!("{what} not loaded")).into()),
    }
}

/// Fail with an auth error once the session has been invalidated.
pub fn ensure_session(session: &SessionContext) -> Result<(), CliError> {
    match session.state() {
        SessionState::Invalidated { reason } => Err(CliError::SessionInvalid { reason }),
        SessionState::Init | SessionState::Active => Ok(()),
    }
}

/// A stderr spinner for interactive table output; hidden otherwise.
pub fn spinner(message: &str, global: &GlobalOpts) -> ProgressBar {
    let interactive = matches!(global.output, OutputFormat::Table)
        && !global.quiet
        && std::io::stderr().is_terminal();
    if !interactive {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_owned());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pet_id_is_trimmed() {
        assert_eq!(pet_id("  P1 ").unwrap().as_str(), "P1");
        assert!(pet_id("   ").is_err());
    }

    #[test]
    fn query_data_prefers_data_over_error() {
        let state = QueryState {
            data: Some(Arc::new(3_u32)),
            error: Some(CoreError::Internal("stale".into())),
            ..QueryState::default()
        };
        assert_eq!(*query_data(state, "n").unwrap(), 3);

        let empty: QueryState<u32> = QueryState {
            error: Some(CoreError::Unauthorized),
            ..QueryState::default()
        };
        assert!(matches!(
            query_data(empty, "n"),
            Err(CliError::SessionInvalid { .. })
        ));
    }
}
