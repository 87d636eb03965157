use anyhow::{Context, Result};
use std::path::Path;

use cogwar::config::Config;
use cogwar::parser::load_events;
use cogwar::storage::open_repository;

use super::open_events;

/// Import an event file into the configured database
pub fn import(config: &Config, input: &Path, batch_size: usize) -> Result<()> {
    println!("Importing events from: {}", input.display());
    println!("================================");

    let events = load_events(input)
        .with_context(|| format!("Failed to load events from {}", input.display()))?;
    let repo = open_repository(&config.database)?;

    let batch_size = batch_size.max(1);
    let mut inserted = 0;
    for (i, batch) in events.chunks(batch_size).enumerate() {
        inserted += repo.insert_events(batch)?;
        tracing::debug!(batch = i + 1, inserted, "Imported batch");
    }

    let total = repo.count()?;
    tracing::info!(file = %input.display(), inserted, total, "Import completed");

    println!("  Parsed: {}", events.len());
    println!("  Inserted: {inserted}");
    println!("  Events in database: {total}");
    println!("  Database: {}", config.database.sqlite_path.display());
    Ok(())
}

/// Print the filter values available in the data
pub fn filters(config: &Config, input: Option<&Path>) -> Result<()> {
    let repo = open_events(config, input)?;
    let options = repo.filter_options()?;

    println!("Filter Options");
    println!("==============");
    println!("  Events: {}", options.total_events);
    match options.date_bounds {
        Some(bounds) => println!("  Dates: {} .. {}", bounds.min, bounds.max),
        None => println!("  Dates: (no data)"),
    }
    println!("  Sources ({}): {}", options.sources.len(), options.sources.join(", "));
    println!("  Languages ({}): {}", options.languages.len(), options.languages.join(", "));
    println!("  Categories ({}):", options.categories.len());
    for category in &options.categories {
        println!("    - {category}");
    }
    Ok(())
}
