use std::process::ExitCode;

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    autouw_cli::run()
}
