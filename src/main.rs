use calibrator::cli::Cli;
use calibrator::config::reader;
use calibrator::search::Search;
use clap::Parser;
use log::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> calibrator::error::Result<()> {
    let spec = reader::read(&cli.input_document)?;
    let mut search = Search::new(spec, cli.n_threads(), cli.debug)?;
    let register = search.run(&cli.result_path())?;

    if let Some(best) = register.best() {
        println!("{}", calibrator::consts::RESULT_HEADER);
        println!("error={:e}", best.error);
    }
    Ok(())
}
