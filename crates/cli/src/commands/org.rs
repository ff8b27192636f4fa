use compline_core::domain::approval::ActorId;
use compline_db::SqlApproverResolver;

use crate::commands::{with_database, CommandResult, StepFailure};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Assignment {
    DepartmentHead,
    PositionHolder,
}

impl Assignment {
    fn command(self) -> &'static str {
        match self {
            Self::DepartmentHead => "org_head",
            Self::PositionHolder => "org_holder",
        }
    }
}

pub fn assign(kind: Assignment, key: &str, actor: &str) -> CommandResult {
    let command = kind.command();
    if key.trim().is_empty() || actor.trim().is_empty() {
        return CommandResult::failure(
            command,
            "invalid_argument",
            "both the directory key and the actor id are required",
            6,
        );
    }

    let key = key.trim().to_string();
    let actor = ActorId(actor.trim().to_string());

    with_database(command, |pool| async move {
        let directory = SqlApproverResolver::new(pool);
        let stored = match kind {
            Assignment::DepartmentHead => directory.assign_department_head(&key, &actor).await,
            Assignment::PositionHolder => directory.assign_position_holder(&key, &actor).await,
        };
        stored.map_err(|error| StepFailure::new("storage", error.to_string(), 7))?;

        Ok(match kind {
            Assignment::DepartmentHead => format!("`{actor}` now heads department `{key}`"),
            Assignment::PositionHolder => format!("`{actor}` now holds position `{key}`"),
        })
    })
}
