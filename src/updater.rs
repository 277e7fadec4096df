//! MFA session refresh workflow.
//!
//! One run walks a fixed sequence:
//!
//! 1. load the credentials and config files
//! 2. pick a base profile from the credentials file
//! 3. resolve the profile's MFA device from `helper_mfa_serial` in the config file
//! 4. pick a session lifetime
//! 5. obtain an MFA code
//! 6. exchange it with STS for a session
//! 7. upsert `<profile><suffix>` and save the credentials file
//!
//! Nothing is written unless every earlier step succeeded. For a profile
//! `work` the result looks like:
//!
//! ```ini
//! [work]
//! aws_access_key_id = AKIA...         # long-term key, untouched
//! aws_secret_access_key = ...
//!
//! [work-mfa]
//! aws_access_key_id = ASIA...         # temporary access key
//! aws_secret_access_key = ...
//! aws_session_token = ...
//! aws_security_token = ...            # same token, legacy name
//! ```

use std::{
    fmt,
    io::{BufRead, Write},
};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    code::CodeProvider,
    credentials::{SessionExchange, SessionRequest},
    merge::{derived_profile_name, merge},
    prompt::{Prompter, eligible_profiles},
    settings::HelperSettings,
    store::{AwsPaths, Document, config_section_name},
};

/// Config key holding the MFA device ARN of a profile.
pub const MFA_SERIAL_CONFIG_KEY: &str = "helper_mfa_serial";

/// The selected profile has no MFA device configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingMfaDevice {
    pub profile: String,
}

impl fmt::Display for MissingMfaDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "you must add {key} to your AWS conf profile with the ARN of your MFA device! Example:\n\
             [{section}]\n\
             {key} = arn:aws:iam::ACCOUNT-NUMBER-WITHOUT-HYPHENS:mfa/MFA-DEVICE-ID",
            key = MFA_SERIAL_CONFIG_KEY,
            section = config_section_name(&self.profile),
        )
    }
}

impl std::error::Error for MissingMfaDevice {}

/// Looks up the MFA device ARN for `profile` in the config document.
pub fn mfa_device(config: &Document, profile: &str) -> Result<String, MissingMfaDevice> {
    config
        .get(&config_section_name(profile), MFA_SERIAL_CONFIG_KEY)
        .map(|arn| arn.trim().to_string())
        .filter(|arn| !arn.is_empty())
        .ok_or_else(|| MissingMfaDevice {
            profile: profile.to_string(),
        })
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub profile: String,
    pub derived_profile: String,
    pub expiration: String,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Updated AWS profile {} with STS credentials. Credentials expire at {}",
            self.derived_profile, self.expiration
        )
    }
}

/// Drives one interactive refresh against a fixed set of files.
pub struct MfaHelper {
    /// Credentials, config and helper file locations
    paths: AwsPaths,
    /// Suffix and code-provider choice, already resolved
    settings: HelperSettings,
}

impl MfaHelper {
    pub fn new(paths: AwsPaths, settings: HelperSettings) -> Self {
        Self { paths, settings }
    }

    /// Runs the whole refresh: prompt, exchange, merge and save.
    ///
    /// # Arguments
    ///
    /// * `prompter` - Terminal (or test buffer) used for the profile, duration
    ///   and manual MFA-code prompts
    /// * `sts` - Session exchange; [`StsExchange`](crate::credentials::StsExchange)
    ///   in production
    ///
    /// # Returns
    ///
    /// * `Ok(Outcome)` - The derived profile was written; carries its name and
    ///   the session expiration
    /// * `Err(anyhow::Error)` - The run stopped before or while saving
    ///
    /// # Errors
    ///
    /// - [`MissingMfaDevice`] when the chosen profile has no
    ///   `helper_mfa_serial` in the config file
    /// - the exchange error when STS rejects the request
    /// - read/parse errors for the credentials or config file, and save errors
    /// - an empty profile list or closed input
    ///
    /// The credentials file is only written after a session was obtained.
    pub async fn run<R, W, E>(&self, prompter: &mut Prompter<R, W>, sts: &E) -> Result<Outcome>
    where
        R: BufRead,
        W: Write,
        E: SessionExchange + ?Sized,
    {
        debug!("Credentials file: {}", self.paths.credentials.display());
        debug!("Config file: {}", self.paths.config.display());

        let credentials = Document::load(&self.paths.credentials).await?;
        let config = Document::load(&self.paths.config).await?;

        let choices = eligible_profiles(&credentials, &self.settings.suffix);
        let profile = prompter.select_profile(&choices)?;

        let device = mfa_device(&config, &profile)?;
        debug!("Using MFA device {device}");

        let duration = prompter.select_duration()?;

        let provider = CodeProvider::for_profile(&self.settings, &config, &profile);
        let mfa_code = provider.obtain(prompter)?;

        let request = SessionRequest {
            profile: profile.clone(),
            mfa_device: device,
            mfa_code,
            duration,
        };
        let session = sts.exchange(&request).await?;

        let updated = merge(&credentials, &profile, &session, &self.settings.suffix);
        updated
            .save(&self.paths.credentials)
            .await
            .context("Failed to save credentials")?;

        let derived_profile = derived_profile_name(&profile, &self.settings.suffix);
        info!("Saved {derived_profile} to {}", self.paths.credentials.display());

        Ok(Outcome {
            profile,
            derived_profile,
            expiration: session.expiration,
        })
    }
}
