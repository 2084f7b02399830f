//! Credential inspection and reset.

use std::error::Error;
use std::path::Path;

use clap::Subcommand;
use emberlog_core::CredentialStore;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Show which credential artifacts are stored
    Status,
    /// Clear the authorization and tokens, keeping the application key
    Reset,
}

pub fn run(config: Option<&Path>, action: AuthAction) -> Result<(), Box<dyn Error>> {
    let config = super::load_config(config)?;
    let mut creds = CredentialStore::open(
        &config.credentials_path()?,
        config.application_key.as_deref(),
    )?;

    match action {
        AuthAction::Status => {
            let c = creds.credential();
            println!("application key:    present");
            println!("pin:                {}", c.pin.as_deref().unwrap_or("-"));
            println!("authorization code: {}", presence(c.authorization_code.is_some()));
            println!("access token:       {}", presence(c.access_token.is_some()));
            println!("refresh token:      {}", presence(c.refresh_token.is_some()));
        }
        AuthAction::Reset => {
            creds.clear_grant()?;
            println!("Stored authorization cleared. The next sync starts a new PIN flow.");
        }
    }
    Ok(())
}

fn presence(present: bool) -> &'static str {
    if present {
        "present"
    } else {
        "missing"
    }
}
