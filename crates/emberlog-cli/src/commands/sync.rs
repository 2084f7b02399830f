//! Sync subcommand: one full pass over every registered device.

use std::error::Error;
use std::path::Path;

use emberlog_core::{
    AuthError, CredentialStore, EcobeeClient, ReportStore, RunStats, SyncEngine, SyncError,
    TokenManager,
};

pub fn run(config: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let config = super::load_config(config)?;
    let store = ReportStore::open(&config.database_path()?)?;
    let creds = CredentialStore::open(
        &config.credentials_path()?,
        config.application_key.as_deref(),
    )?;
    let client = EcobeeClient::new(&config.remote)?;
    let tokens = TokenManager::new(client.clone(), creds);
    let mut engine = SyncEngine::new(client, tokens, store, config.revision_cache_path()?);

    let mut stats = RunStats::default();
    let result = engine.run(&mut stats);

    // The summary reflects whatever was persisted, run failure included.
    print_summary(&stats);

    // Needs-operator is still a failed run: a scheduler watching exit
    // codes must not read it as success.
    if let Err(SyncError::Auth(AuthError::AuthorizationPending { pin })) = &result {
        println!();
        println!("Authorization required. Register PIN '{pin}' under the remote");
        println!("portal's My Apps section, then run 'emberlog sync' again.");
    }

    result.map_err(Into::into)
}

fn print_summary(stats: &RunStats) {
    println!("Sync summary:");
    println!("  devices synced:     {}", stats.devices_synced);
    println!("  devices skipped:    {}", stats.devices_skipped);
    println!("  windows requested:  {}", stats.windows_requested);
    println!("  windows skipped:    {}", stats.windows_skipped);
    println!("  rows written:       {}", stats.rows_written);
    println!("  duplicates merged:  {}", stats.duplicates_merged);
    println!("  duplicates kept:    {}", stats.duplicates_kept);
    println!("  blanks discarded:   {}", stats.blanks_discarded);
    println!("  malformed rows:     {}", stats.malformed_rows);
    println!("  retries:            {}", stats.retries);

    for d in &stats.devices {
        println!(
            "  {}: {} written, {} merged, {} kept, {} blank, {} malformed",
            d.name,
            d.rows_written,
            d.duplicates_merged,
            d.duplicates_kept,
            d.blanks_discarded,
            d.malformed_rows
        );
    }
}
