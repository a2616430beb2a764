use {
    anyhow::Result,
    clap::Parser,
    sealfile::{cli::Cli, config::Config, report_error, run, setup_logger},
    std::process,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    setup_logger(config.log_file.clone(), &config.log_filter)?;

    if let Err(err) = run(&cli, &config) {
        report_error(&err);
        process::exit(1);
    }
    Ok(())
}
