use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{ConfigLoader, Region, profile::ProfileFileCredentialsProvider};
use aws_sdk_sts::{Client, error::DisplayErrorContext};
use aws_smithy_types::date_time::Format;
use log::{debug, info};

/// STS needs a region even though `GetSessionToken` is global.
const FALLBACK_REGION: &str = "us-east-1";

/// Temporary credentials issued by STS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: String,
}

/// Everything needed to ask for a session on behalf of a profile.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Profile whose long-term identity signs the request.
    pub profile: String,
    pub mfa_device: String,
    pub mfa_code: String,
    pub duration: u32,
}

#[async_trait]
pub trait SessionExchange {
    async fn exchange(&self, request: &SessionRequest) -> Result<Session>;
}

/// `GetSessionToken` against the real STS endpoint.
///
/// Requests are signed with the long-term keys of the named profile from the
/// shared credentials/config files. Keys exported through `AWS_ACCESS_KEY_ID`
/// and `AWS_SECRET_ACCESS_KEY` are ignored.
///
/// # Example
///
/// ```no_run
/// let request = SessionRequest {
///     profile: "work".to_string(),
///     mfa_device: "arn:aws:iam::123456789012:mfa/me".to_string(),
///     mfa_code: "123456".to_string(),
///     duration: 3600,
/// };
/// let session = StsExchange.exchange(&request).await?;
/// ```
#[derive(Debug, Default)]
pub struct StsExchange;

/// Credentials provider reading only the profile files.
fn profile_credentials(profile: &str) -> ProfileFileCredentialsProvider {
    ProfileFileCredentialsProvider::builder()
        .profile_name(profile)
        .build()
}

impl StsExchange {
    fn loader(profile: &str) -> ConfigLoader {
        aws_config::from_env()
            .profile_name(profile)
            .credentials_provider(profile_credentials(profile))
    }

    async fn client(profile: &str) -> Client {
        let config = Self::loader(profile).load().await;
        if config.region().is_some() {
            return Client::new(&config);
        }

        debug!("No region configured for {profile}, using {FALLBACK_REGION}");
        let config = Self::loader(profile)
            .region(Region::new(FALLBACK_REGION))
            .load()
            .await;
        Client::new(&config)
    }
}

#[async_trait]
impl SessionExchange for StsExchange {
    /// Exchanges the profile's long-term identity and an MFA code for a session.
    ///
    /// # Arguments
    ///
    /// * `request` - Profile name, MFA device ARN, current one-time code and the
    ///   requested lifetime in seconds
    ///
    /// # Returns
    ///
    /// * `Ok(Session)` - Temporary keys, session token and expiration
    /// * `Err(anyhow::Error)` - The call failed; the message carries the
    ///   service's reason
    ///
    /// # Errors
    ///
    /// An invalid or expired code, an unknown device, missing long-term keys
    /// for the profile and network failures all end up here. Nothing is
    /// retried.
    async fn exchange(&self, request: &SessionRequest) -> Result<Session> {
        info!(
            "Fetching credentials - Profile: {}, Duration: {}s",
            request.profile, request.duration
        );

        let duration = i32::try_from(request.duration).context("Duration out of range")?;
        let output = Self::client(&request.profile)
            .await
            .get_session_token()
            .duration_seconds(duration)
            .serial_number(&request.mfa_device)
            .token_code(&request.mfa_code)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", DisplayErrorContext(&e)))
            .context("Failed to get session token")?;

        let credentials = output.credentials().context("No credentials returned")?;

        Ok(Session {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expiration: credentials.expiration().fmt(Format::DateTime)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use aws_sdk_sts::config::ProvideCredentials;

    use super::*;

    #[tokio::test]
    async fn test_profile_keys_win_over_environment() {
        let dir = tempfile::tempdir().unwrap();
        let credentials = dir.path().join("credentials");
        std::fs::write(
            &credentials,
            "[work]\naws_access_key_id = PROFILEKEY\naws_secret_access_key = profile-secret\n",
        )
        .unwrap();

        // Only this test touches these variables.
        unsafe {
            env::set_var("AWS_SHARED_CREDENTIALS_FILE", &credentials);
            env::set_var("AWS_CONFIG_FILE", dir.path().join("config"));
            env::set_var("AWS_ACCESS_KEY_ID", "ENVKEY");
            env::set_var("AWS_SECRET_ACCESS_KEY", "env-secret");
        }

        let resolved = profile_credentials("work").provide_credentials().await;

        unsafe {
            for name in [
                "AWS_SHARED_CREDENTIALS_FILE",
                "AWS_CONFIG_FILE",
                "AWS_ACCESS_KEY_ID",
                "AWS_SECRET_ACCESS_KEY",
            ] {
                env::remove_var(name);
            }
        }

        let resolved = resolved.unwrap();
        assert_eq!(resolved.access_key_id(), "PROFILEKEY");
        assert_eq!(resolved.secret_access_key(), "profile-secret");
    }
}
