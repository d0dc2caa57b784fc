use std::process::ExitCode;

fn main() -> ExitCode {
    brokerdesk_cli::run()
}
