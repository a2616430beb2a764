//! Runs an operation on a worker thread and renders its progress.

use {
    crate::{cli::Action, term::set_status},
    anyhow::{Result, anyhow},
    sealfile_sdk::{FatalError, decrypt_file, encrypt_file},
    std::{path::PathBuf, sync::mpsc, thread},
    zeroize::Zeroizing,
};

/// Formats a status line, e.g. `Encrypting: 3/10 chunks (30%)`.
#[must_use]
#[inline]
pub fn format_progress(action: Action, current: u64, total: u64) -> String {
    format!(
        "{action}: {current}/{total} chunks ({}%)",
        percent(current, total)
    )
}

fn percent(current: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    let percent = u128::from(current.min(total)) * 100 / u128::from(total);
    u64::try_from(percent).unwrap_or(100)
}

/// Runs `action` on a dedicated thread and shows its progress in the status
/// line until it finishes.
#[inline]
pub fn run_operation(
    action: Action,
    input: PathBuf,
    output: PathBuf,
    password: Zeroizing<String>,
) -> Result<Result<(), FatalError>> {
    let (sender, receiver) = mpsc::channel::<(u64, u64)>();
    let worker = thread::Builder::new()
        .name("worker".into())
        .spawn(move || {
            let mut progress = |current: u64, total: u64| {
                // The receiver only goes away if the main thread stopped listening.
                let _ = sender.send((current, total));
            };
            let password = password.as_bytes();
            match action {
                Action::Encrypt => encrypt_file(&input, &output, password, &mut progress),
                Action::Decrypt => decrypt_file(&input, &output, password, &mut progress),
            }
        })?;

    let status = set_status(format_progress(action, 0, 0));
    let mut shown = None;
    for (current, total) in receiver {
        let key = (percent(current, total), total);
        if shown != Some(key) {
            status.set(format_progress(action, current, total));
            shown = Some(key);
        }
    }
    drop(status);

    worker
        .join()
        .map_err(|panic| anyhow!("worker thread panicked: {panic:?}"))
}
