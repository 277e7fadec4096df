//! INI document storage for the AWS credentials, config and helper files.
//!
//! Documents keep section and key names verbatim (case-sensitive) and in file
//! order, so rewriting the credentials file only changes what was explicitly
//! set. Keys that appear before the first section header land in the reserved
//! [`RESERVED_SECTION`].

use std::{
    env,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use configparser::ini::{Ini, WriteOptions};
use log::debug;
use tokio::{fs, io::AsyncWriteExt};

/// Section holding keys that precede any header. Never a selectable profile.
pub const RESERVED_SECTION: &str = "DEFAULT";

const HELPER_FILE_NAME: &str = ".aws_mfa_helper.cfg";

/// An ordered section -> key -> value mapping parsed from an INI file.
#[derive(Debug, Clone)]
pub struct Document {
    ini: Ini,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut ini = Ini::new_cs();
        ini.set_default_section(RESERVED_SECTION);
        // `#` and `;` inside a value are data, not comments.
        let no_inline_comments: &[char] = &[];
        ini.set_inline_comment_symbols(Some(no_inline_comments));
        ini.set_multiline(true);
        Self { ini }
    }

    /// Parses INI text into a document.
    pub fn parse(text: &str) -> Result<Self> {
        let mut doc = Self::new();
        doc.ini
            .read(text.to_string())
            .map_err(|e| anyhow!("Failed to parse INI content: {e}"))?;
        Ok(doc)
    }

    /// Loads a document from disk. A missing file is an empty document.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} does not exist, starting empty", path.display());
                return Ok(Self::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        Self::parse(&text).with_context(|| format!("Failed to load {}", path.display()))
    }

    /// Writes the whole document to `path`, replacing the file.
    ///
    /// The content is written to a sibling `<name>.tmp` file created with mode
    /// `0600` (on unix) and then renamed over the target. Missing parent
    /// directories are created first.
    ///
    /// # Arguments
    ///
    /// * `path` - Destination file, typically `~/.aws/credentials`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Every section was written and the file replaced
    /// * `Err(anyhow::Error)` - The directory, temporary file or rename failed
    ///
    /// # Errors
    ///
    /// On failure the temporary file is removed and the previous content of
    /// `path` is left as it was.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut tmp_name = path
            .file_name()
            .context("Credentials path has no file name")?
            .to_os_string();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        let result = async {
            write_private(&tmp, self.to_ini_string().as_bytes()).await?;
            fs::rename(&tmp, path)
                .await
                .with_context(|| format!("Failed to replace {}", path.display()))
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&tmp).await;
        }
        result?;

        debug!("Saved {}", path.display());
        Ok(())
    }

    /// Serializes the document as `key = value` lines with a blank line
    /// between sections, the layout the AWS CLI writes.
    pub fn to_ini_string(&self) -> String {
        self.ini
            .pretty_writes(&WriteOptions::new_with_params(true, 2, 1))
    }

    /// Section names in file order. An empty reserved section is left out.
    pub fn sections(&self) -> Vec<String> {
        self.ini
            .get_map_ref()
            .iter()
            .filter(|(name, keys)| name.as_str() != RESERVED_SECTION || !keys.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn contains(&self, section: &str) -> bool {
        self.ini.get_map_ref().contains_key(section)
    }

    /// Key/value pairs of one section in file order. Valueless keys map to `None`.
    #[cfg(test)]
    pub fn section(&self, section: &str) -> Option<Vec<(String, Option<String>)>> {
        self.ini.get_map_ref().get(section).map(|keys| {
            keys.iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.ini.get(section, key)
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.ini.set(section, key, Some(value.into()));
    }

    /// Adds an empty section unless it already exists.
    pub fn ensure_section(&mut self, section: &str) {
        if !self.contains(section) {
            self.ini
                .get_mut_map()
                .insert(section.to_string(), Default::default());
        }
    }
}

/// Creates `path` readable by the owner only and fills it with `contents`.
///
/// A leftover file from an earlier failed run is removed first so the mode
/// applies to a freshly created file.
async fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed stale {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options
        .open(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.sync_all().await?;
    Ok(())
}

/// Name of the config-file section for a profile.
///
/// The config file prefixes every profile with `profile ` except `default`;
/// the credentials file uses bare names.
pub fn config_section_name(profile: &str) -> String {
    if profile == "default" {
        profile.to_string()
    } else {
        format!("profile {profile}")
    }
}

/// Locations of the files the helper reads and writes.
#[derive(Debug, Clone)]
pub struct AwsPaths {
    pub credentials: PathBuf,
    pub config: PathBuf,
    pub helper: PathBuf,
}

impl AwsPaths {
    /// Resolves the standard locations under the home directory, honoring
    /// `AWS_SHARED_CREDENTIALS_FILE` and `AWS_CONFIG_FILE` like the AWS CLI.
    pub fn resolve() -> Result<Self> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(Self::from_home(
            &home,
            env::var_os("AWS_SHARED_CREDENTIALS_FILE").map(PathBuf::from),
            env::var_os("AWS_CONFIG_FILE").map(PathBuf::from),
        ))
    }

    fn from_home(home: &Path, credentials: Option<PathBuf>, config: Option<PathBuf>) -> Self {
        Self {
            credentials: credentials.unwrap_or_else(|| home.join(".aws").join("credentials")),
            config: config.unwrap_or_else(|| home.join(".aws").join("config")),
            helper: home.join(HELPER_FILE_NAME),
        }
    }
}
