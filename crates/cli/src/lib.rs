pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "compline",
    about = "Compline operator CLI",
    long_about = "Operate the Compline approval service: migrations, config inspection, readiness checks, approval line templates and the org directory.",
    after_help = "Examples:\n  compline doctor --json\n  compline template import lines/inspection.toml\n  compline org head quality U-QA-LEAD"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database connectivity, schema and dispatch readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(subcommand, about = "Manage approval line templates")]
    Template(TemplateCommand),
    #[command(subcommand, about = "Maintain the org directory used to resolve approvers")]
    Org(OrgCommand),
}

#[derive(Debug, Subcommand)]
enum TemplateCommand {
    #[command(about = "Validate a TOML approval line file and store it, replacing any previous version")]
    Import {
        #[arg(help = "Path to the template file")]
        path: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum OrgCommand {
    #[command(about = "Set the head of a department")]
    Head { department: String, actor: String },
    #[command(about = "Set the holder of a named position")]
    Holder { position: String, actor: String },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Template(TemplateCommand::Import { path }) => commands::template::import(&path),
        Command::Org(OrgCommand::Head { department, actor }) => {
            commands::org::assign(commands::org::Assignment::DepartmentHead, &department, &actor)
        }
        Command::Org(OrgCommand::Holder { position, actor }) => {
            commands::org::assign(commands::org::Assignment::PositionHolder, &position, &actor)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
