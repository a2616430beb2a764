pub mod cli;
pub mod config;
pub mod password;
pub mod paths;
pub mod term;
pub mod worker;

use {
    crate::{
        cli::{Action, Cli},
        config::Config,
        password::{is_yes, read_password},
        paths::{OutputState, output_path, preflight},
        term::{TermLayer, ask},
        worker::run_operation,
    },
    anyhow::{Error, Result},
    sealfile_sdk::FatalError,
    std::{path::PathBuf, sync::Mutex},
    tracing::{error, info},
    tracing_subscriber::{EnvFilter, prelude::*},
};

#[inline]
pub fn run(cli: &Cli, config: &Config) -> Result<()> {
    let action = cli.command.action();
    let args = cli.command.args();
    let output = match &args.output {
        Some(output) => output.clone(),
        None => output_path(action, &args.input, &config.extension)?,
    };

    if preflight(&args.input, &output)? == OutputState::Exists && !args.force {
        let answer = ask(format!(
            "Output file {} already exists. Overwrite? [y/N]",
            output.display()
        ))?;
        if !is_yes(&answer) {
            info!("Canceled.");
            return Ok(());
        }
    }

    let password = read_password(action == Action::Encrypt)?;
    run_operation(action, args.input.clone(), output.clone(), password)??;
    match action {
        Action::Encrypt => info!("Encrypted file saved to {}", output.display()),
        Action::Decrypt => info!("Decrypted file saved to {}", output.display()),
    }
    Ok(())
}

/// Logs `err` for the user. [`FatalError`] details are shown on a separate line.
#[inline]
pub fn report_error(err: &Error) {
    if let Some(err) = err.downcast_ref::<FatalError>() {
        error!("Error: {err}");
        if let Some(details) = err.details() {
            error!("Details: {details}");
        }
    } else {
        error!("Error: {err:#}");
    }
}

#[inline]
pub fn setup_logger(log_file: Option<PathBuf>, log_filter: &str) -> Result<()> {
    let fmt_layer = log_file
        .map(|path| -> Result<_> {
            let file = fs_err::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Ok(tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)))
        })
        .transpose()?;
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(EnvFilter::try_new(log_filter)?)
        .with(TermLayer)
        .init();
    Ok(())
}
