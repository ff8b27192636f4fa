use compline_db::migrations;

use crate::commands::{with_database, CommandResult};

pub fn run() -> CommandResult {
    with_database("migrate", |_pool| async {
        let known = migrations::known_migrations();
        Ok(format!("schema is current ({known} migration(s) known)"))
    })
}
