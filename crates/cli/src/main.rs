use std::process::ExitCode;

fn main() -> ExitCode {
    compline_cli::run()
}
