//! Optional overrides from `~/.aws_mfa_helper.cfg`.
//!
//! ```ini
//! mfa_creds_suffix = -mfa
//! code_provider = 1password
//! op_account = my.1password.com
//! ```
//!
//! The keys may also live under a `[helper]` section. The file is
//! best-effort: anything wrong with it leaves the defaults in place.

use std::path::Path;

use log::debug;

use crate::store::{Document, RESERVED_SECTION};

pub const DEFAULT_SUFFIX: &str = "-mfa";

const HELPER_SECTION: &str = "helper";
const SUFFIX_KEY: &str = "mfa_creds_suffix";
const CODE_PROVIDER_KEY: &str = "code_provider";
const OP_ACCOUNT_KEY: &str = "op_account";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CodeProviderKind {
    #[default]
    Manual,
    OnePassword,
}

impl CodeProviderKind {
    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "manual" => Some(Self::Manual),
            "1password" | "onepassword" | "op" => Some(Self::OnePassword),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperSettings {
    /// Appended to the base profile name to form the derived profile.
    pub suffix: String,
    pub code_provider: CodeProviderKind,
    pub op_account: Option<String>,
}

impl Default for HelperSettings {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_string(),
            code_provider: CodeProviderKind::default(),
            op_account: None,
        }
    }
}

impl HelperSettings {
    pub async fn load(path: &Path) -> Self {
        match Document::load(path).await {
            Ok(doc) => {
                debug!("Loaded helper config from {}", path.display());
                Self::from_document(&doc)
            }
            Err(e) => {
                debug!("Ignoring helper config: {e:#}");
                Self::default()
            }
        }
    }

    pub fn from_document(doc: &Document) -> Self {
        let lookup = |key: &str| {
            doc.get(HELPER_SECTION, key)
                .or_else(|| doc.get(RESERVED_SECTION, key))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut settings = Self::default();

        if let Some(suffix) = lookup(SUFFIX_KEY) {
            debug!("Setting MFA credentials suffix to {suffix}");
            settings.suffix = suffix;
        }

        if let Some(name) = lookup(CODE_PROVIDER_KEY) {
            match CodeProviderKind::parse(&name) {
                Some(kind) => settings.code_provider = kind,
                None => debug!("Unknown code provider {name}, using manual entry"),
            }
        }

        settings.op_account = lookup(OP_ACCOUNT_KEY);
        settings
    }
}
