use std::process::ExitCode;

fn main() -> ExitCode {
    crmlite_cli::run()
}
