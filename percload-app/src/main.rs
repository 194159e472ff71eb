mod app;
mod cli;
mod headless;
mod session;

use anyhow::{Context, Result};
use log::info;

use app::App;
use session::Session;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match cli::parse_args(std::env::args().skip(1)) {
        Ok(Some(args)) => args,
        Ok(None) => {
            println!("{}", cli::USAGE);
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}\n\n{}", cli::USAGE);
            std::process::exit(2);
        }
    };

    let session = Session::prepare(&args)?;
    let sequencer = session.open()?;

    let (session, finished) = if args.simulate {
        let finished = headless::run(&session, sequencer, &args);
        (session, finished)
    } else {
        App::new(session, sequencer)?.run()?
    };

    let summary = session.summarize(&finished)?;
    info!(
        "Results saved to {} ({} rows)",
        session.csv_path.display(),
        summary.completed_trials
    );

    match finished.error {
        Some(e) => Err(e).context("session halted"),
        None => Ok(()),
    }
}
