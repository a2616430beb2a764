use {
    anyhow::{Context, Result, anyhow, ensure},
    serde::{Deserialize, Serialize},
    std::path::{Path, PathBuf},
};

const CONFIG_FILE_NAME: &str = "sealfile.json5";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Appended to the file name when encrypting, removed when decrypting.
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_log_filter() -> String {
    "info".into()
}

fn default_extension() -> String {
    "sealed".into()
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            log_file: None,
            log_filter: default_log_filter(),
            extension: default_extension(),
        }
    }
}

#[inline]
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| anyhow!("cannot find config dir"))?;
    Ok(config_dir.join(CONFIG_FILE_NAME))
}

impl Config {
    /// Loads the config from `path`.
    ///
    /// Without `path`, the default location is used, and a missing file there
    /// means default settings.
    #[inline]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let path = default_config_path()?;
                if !path.try_exists()? {
                    return Ok(Self::default());
                }
                path
            }
        };
        Self::parse(&fs_err::read_to_string(&path)?)
            .with_context(|| format!("invalid config file {path:?}"))
    }

    #[inline]
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = json5::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let extension = &self.extension;
        ensure!(
            !extension.is_empty() && !extension.starts_with('.') && !extension.contains(['/', '\\']),
            "invalid `extension` value: {extension:?}"
        );
        Ok(())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.extension, "sealed");
        assert!(config.log_file.is_none());
    }

    #[test]
    fn all_fields() {
        let config = Config::parse(
            r#"{
                // comments are allowed
                log_file: "/tmp/sealfile.log",
                log_filter: "sealfile=debug",
                extension: "enc",
            }"#,
        )
        .unwrap();
        assert_eq!(config.log_file, Some("/tmp/sealfile.log".into()));
        assert_eq!(config.log_filter, "sealfile=debug");
        assert_eq!(config.extension, "enc");
    }

    #[test]
    fn bad_extension() {
        assert!(Config::parse(r#"{ extension: "" }"#).is_err());
        assert!(Config::parse(r#"{ extension: ".enc" }"#).is_err());
        assert!(Config::parse(r#"{ extension: "a/b" }"#).is_err());
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json5");
        assert!(Config::load(Some(&path)).is_err());

        fs_err::write(&path, r#"{ extension: "enc" }"#).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().extension, "enc");
    }
}
