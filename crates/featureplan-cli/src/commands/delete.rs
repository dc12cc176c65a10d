//! Delete a registered table descriptor

use anyhow::{Context, Result};
use featureplan_registry::Registry;
use std::io::{self, Write};

use crate::config::CliConfig;
use crate::output::{print_error, print_info, print_success};

use super::create_registry;

pub async fn run(config: &CliConfig, name: &str, yes: bool) -> Result<()> {
    let registry = create_registry(config).await?;

    let table = match registry.get_features(name).await {
        Ok(t) => t,
        Err(_) => {
            print_error(&format!("'{}' not found", name));
            return Ok(());
        }
    };

    print_info(&format!("{}: {}", table.kind(), table.name()));

    if !yes {
        print!("\nAre you sure you want to delete '{}'? [y/N] ", name);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            print_info("Deletion cancelled");
            return Ok(());
        }
    }

    let deleted = registry
        .delete_features(name)
        .await
        .context("Failed to delete from registry")?;

    if deleted {
        print_success(&format!("Deleted '{}' from registry", name));
    } else {
        print_error(&format!("'{}' was already removed", name));
    }
    print_info("Views built on it keep their resolved copy until re-registered");

    Ok(())
}
