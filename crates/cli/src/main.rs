use std::process::ExitCode;

fn main() -> ExitCode {
    callbrief_cli::run()
}
