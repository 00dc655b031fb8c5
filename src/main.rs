use clap::Parser;
use swingtrader::cli::{run, Cli};
use swingtrader::logging;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_json);
    run(cli)
}
