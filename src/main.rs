use std::process;

use anyhow;
use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use symblock::interfaces::cli::{run, Cli};

/// Initialises `log4rs` from the file given on the command line, or else with the main output
/// on standard output and warnings on standard error.
fn init_logging(cli: &Cli) -> Result<(), anyhow::Error> {
    if let Some(path) = &cli.log_config {
        return log4rs::init_file(path, Default::default());
    }
    let output = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{m}{n}")))
        .build();
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%H:%M:%S)} {h({l:<5})} {t} - {m}{n}",
        )))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("output", Box::new(output)))
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .logger(
            Logger::builder()
                .appender("output")
                .additive(false)
                .build("symblock-output", LevelFilter::Info),
        )
        .build(Root::builder().appender("stderr").build(LevelFilter::Warn))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = init_logging(&cli) {
        eprintln!("Unable to initialise logging: {err}");
        process::exit(2);
    }
    if let Err(err) = run(&cli) {
        log::error!("{err:#}");
        process::exit(1);
    }
}
