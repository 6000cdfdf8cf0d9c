use std::process::ExitCode;
use std::str::FromStr;

use clap::Parser;

use claims_cv::cli::Cli;

fn main() -> ExitCode {
    // `.env` supplies CV_LOG_LEVEL / CV_THREADS defaults; a missing file is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match claims_cv::app::run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn init_logging(level: &str) {
    let level = tracing::Level::from_str(level).unwrap_or(tracing::Level::WARN);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
