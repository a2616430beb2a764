use {
    anyhow::{Result, bail, ensure},
    rpassword::prompt_password,
    zeroize::Zeroizing,
};

/// Asks for the password without echo. A new password is asked twice.
#[inline]
pub fn read_password(confirm: bool) -> Result<Zeroizing<String>> {
    let password = Zeroizing::new(prompt_password("Password: ")?);
    let confirmation = if confirm {
        Some(Zeroizing::new(prompt_password("Repeat password: ")?))
    } else {
        None
    };
    check_password(&password, confirmation.as_deref().map(String::as_str))?;
    Ok(password)
}

fn check_password(password: &str, confirmation: Option<&str>) -> Result<()> {
    ensure!(!password.is_empty(), "no password provided");
    if let Some(confirmation) = confirmation {
        if password != confirmation {
            bail!("passwords do not match");
        }
    }
    Ok(())
}

/// Parses an answer to a yes/no question. Anything but "y" or "yes" means no.
#[must_use]
pub(crate) fn is_yes(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_checks() {
        assert!(check_password("secret", None).is_ok());
        assert!(check_password("secret", Some("secret")).is_ok());
        assert!(check_password("", None).is_err());
        assert!(check_password("", Some("")).is_err());
        assert!(check_password("secret", Some("Secret")).is_err());
    }

    #[test]
    fn yes_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }
}
