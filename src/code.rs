//! Where the MFA one-time code comes from.

use std::{
    io::{BufRead, Write},
    process::Command,
};

use anyhow::{Context, Result, ensure};
use log::{debug, info, warn};

use crate::{
    prompt::Prompter,
    settings::{CodeProviderKind, HelperSettings},
    store::{Document, config_section_name},
};

/// Config key naming the 1Password item that holds a profile's TOTP secret.
pub const TOTP_SERVICE_CONFIG_KEY: &str = "helper_totp_service_name";

/// Generates the code through the 1Password CLI (`op item get ... --otp`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnePassword {
    pub program: String,
    pub account: Option<String>,
    pub item: String,
}

impl OnePassword {
    pub fn new(account: Option<String>, item: String) -> Self {
        Self {
            program: "op".to_string(),
            account,
            item,
        }
    }

    fn args(&self) -> Vec<&str> {
        let mut args = vec!["item", "get"];
        if let Some(account) = &self.account {
            args.extend(["--account", account.as_str()]);
        }
        args.extend([self.item.as_str(), "--otp"]);
        args
    }

    pub fn fetch(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .args(self.args())
            .output()
            .with_context(|| format!("Failed to run {}", self.program))?;

        ensure!(
            output.status.success(),
            "{} exited with {}: {}",
            self.program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );

        parse_otp(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Accepts exactly six ASCII digits, surrounding whitespace ignored.
pub fn parse_otp(raw: &str) -> Result<String> {
    let otp = raw.trim();
    ensure!(
        otp.len() == 6 && otp.chars().all(|c| c.is_ascii_digit()),
        "Unexpected OTP format"
    );
    Ok(otp.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeProvider {
    Manual,
    OnePassword(OnePassword),
}

impl CodeProvider {
    /// Picks the provider the helper configuration asks for.
    ///
    /// Automatic generation needs the profile's `helper_totp_service_name`;
    /// without it the operator is prompted instead.
    pub fn for_profile(settings: &HelperSettings, config: &Document, profile: &str) -> Self {
        match settings.code_provider {
            CodeProviderKind::Manual => Self::Manual,
            CodeProviderKind::OnePassword => {
                match config.get(&config_section_name(profile), TOTP_SERVICE_CONFIG_KEY) {
                    Some(item) => {
                        debug!("Using 1Password item {item} for MFA codes");
                        Self::OnePassword(OnePassword::new(settings.op_account.clone(), item))
                    }
                    None => {
                        warn!(
                            "{TOTP_SERVICE_CONFIG_KEY} was not found in AWS config for {profile}. Cannot auto-generate TOTP code"
                        );
                        Self::Manual
                    }
                }
            }
        }
    }

    /// Returns an MFA code, falling back to the prompt if generation fails.
    pub fn obtain<R: BufRead, W: Write>(&self, prompter: &mut Prompter<R, W>) -> Result<String> {
        if let Self::OnePassword(op) = self {
            match op.fetch() {
                Ok(code) => {
                    info!("Retrieved MFA token from 1Password");
                    return Ok(code);
                }
                Err(e) => {
                    debug!("Failed to get TOTP code from 1Password: {e:#}");
                    warn!("Failed to get token from 1Password, falling back to manual input");
                }
            }
        }

        prompter.mfa_code()
    }
}
