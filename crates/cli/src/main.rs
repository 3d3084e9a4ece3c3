use std::process::ExitCode;

fn main() -> ExitCode {
    deskbook_cli::run()
}
