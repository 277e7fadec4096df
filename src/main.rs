//! AWS MFA Helper
//!
//! Interactively refreshes temporary AWS credentials. The operator picks a
//! profile from the credentials file, a session lifetime and an MFA code;
//! the long-term identity of that profile is exchanged with STS for session
//! credentials, which are saved to `<profile>-mfa` in the same file.

use std::process::ExitCode;

use clap::Parser;
use log::debug;

mod cli;
mod code;
mod credentials;
mod merge;
mod prompt;
mod settings;
mod store;
mod updater;

use cli::Args;
use credentials::StsExchange;
use prompt::Prompter;
use settings::HelperSettings;
use store::AwsPaths;
use updater::MfaHelper;

#[tokio::main]
async fn main() -> ExitCode {
    let Args { debug, version: () } = Args::parse();

    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    // Prompts block the main thread, so the interrupt is handled on a worker.
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nExiting...\n");
            std::process::exit(0);
        }
    });

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let paths = AwsPaths::resolve()?;
    let settings = HelperSettings::load(&paths.helper).await;
    debug!("Helper settings: {settings:?}");

    let mut prompter = Prompter::stdio();
    prompter.say("AWS MFA Helper")?;

    let outcome = MfaHelper::new(paths, settings)
        .run(&mut prompter, &StsExchange)
        .await?;

    debug!("Base profile: {}", outcome.profile);
    prompter.say(&format!("\n{outcome}"))?;
    Ok(())
}
