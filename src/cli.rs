//! Command-line interface definitions.

use clap::{ArgAction, Parser};

/// AWS MFA Helper.
///
/// Reads the AWS credentials and config files, obtains STS session
/// credentials with an MFA code and saves them to `<profile>-mfa` in the
/// credentials file.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_version_flag = true)]
pub struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Show version and exit
    #[arg(short = 'v', long, action = ArgAction::Version)]
    pub version: (),
}
