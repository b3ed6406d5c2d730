use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::process::ExitCode;

use placement::{BuildSession, SaveStore, SessionError, SessionOutcome};
use tracing::{debug, error, info, warn};

use super::bootstrap::AppWiring;
use super::script::{parse_script_line, ScriptCommand};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ScriptSummary {
    pub(crate) lines: usize,
    pub(crate) applied: usize,
    pub(crate) rejected: usize,
    pub(crate) parse_errors: usize,
    pub(crate) persistence_errors: usize,
}

pub(crate) fn run(app: AppWiring, script: Option<&Path>) -> ExitCode {
    let AppWiring { mut session, store } = app;
    let summary = match script {
        Some(path) => match File::open(path) {
            Ok(file) => run_script(&mut session, &store, BufReader::new(file)),
            Err(err) => {
                error!(path = %path.display(), error = %err, "script_open_failed");
                return ExitCode::FAILURE;
            }
        },
        None => run_script(&mut session, &store, io::stdin().lock()),
    };

    match summary {
        Ok(summary) => {
            info!(
                lines = summary.lines,
                applied = summary.applied,
                rejected = summary.rejected,
                parse_errors = summary.parse_errors,
                persistence_errors = summary.persistence_errors,
                placed_count = session.placed_ids().len(),
                "script_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "script_read_failed");
            ExitCode::FAILURE
        }
    }
}

/// Feeds every line of `reader` into the session. Bad lines and rejected
/// operations are logged and skipped; only a read failure stops the run.
pub(crate) fn run_script(
    session: &mut BuildSession,
    store: &SaveStore,
    reader: impl BufRead,
) -> io::Result<ScriptSummary> {
    let mut summary = ScriptSummary::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = index + 1;
        summary.lines += 1;

        let command = match parse_script_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                warn!(line = line_number, error = %err, "script_line_invalid");
                summary.parse_errors += 1;
                continue;
            }
        };

        match apply_command(session, store, command) {
            Ok(outcome) => {
                if outcome != SessionOutcome::NoOp {
                    debug!(line = line_number, outcome = ?outcome, "command_applied");
                }
                summary.applied += 1;
            }
            Err(SessionError::Rejected(err)) => {
                warn!(line = line_number, error = %err, "command_rejected");
                summary.rejected += 1;
            }
            Err(SessionError::Persistence(err)) => {
                error!(line = line_number, error = %err, "persistence_failed");
                summary.persistence_errors += 1;
            }
        }
    }
    Ok(summary)
}

fn apply_command(
    session: &mut BuildSession,
    store: &SaveStore,
    command: ScriptCommand,
) -> Result<SessionOutcome, SessionError> {
    match command {
        ScriptCommand::Event(event) => session.handle_event(event, store),
        ScriptCommand::SelectPrefab { name } => Ok(session.select_prefab(&name)?),
        ScriptCommand::Shift { id, dx, dy } => Ok(session.shift_placed(id, dx, dy)?),
        ScriptCommand::Tick { count } => {
            for _ in 0..count {
                if let Some(position) = session.tick() {
                    debug!(x = position.x, y = position.y, z = position.z, "active_object_moved");
                }
            }
            Ok(SessionOutcome::NoOp)
        }
        ScriptCommand::Status => {
            let visual = session.visual_state();
            info!(
                active = ?visual.active,
                selected = ?visual.selected,
                following_cursor = visual.active_following_cursor,
                material_index = visual.current_material_index,
                placed_count = session.placed_ids().len(),
                occupied_cells = session.occupancy().occupied_count(),
                "session_status"
            );
            Ok(SessionOutcome::NoOp)
        }
    }
}
