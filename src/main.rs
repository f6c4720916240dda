use std::process::ExitCode;

use clap::error::ErrorKind;
use pipecopy::cli::{self, Exit};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => Exit::Success.into(),
                _ => Exit::InvalidUsage.into(),
            };
        }
    };

    if let Err(e) = cli::init_logging(&args.log_level) {
        eprintln!("error: {:#}", e);
        return Exit::InvalidUsage.into();
    }

    match cli::run(&args).await {
        Ok(report) => {
            println!("{}", report);
            Exit::Success.into()
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            Exit::for_error(&e).into()
        }
    }
}
