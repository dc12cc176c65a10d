//! Register table descriptors from a YAML or JSON file

use anyhow::{Context, Result};
use featureplan_core::Error;
use featureplan_registry::Registry;
use std::sync::Arc;

use crate::config::CliConfig;
use crate::output::{print_error, print_info, print_success};

use super::{create_registry, read_descriptors};

/// Registers every descriptor in `file`, in file order
///
/// Later descriptors may refer to earlier ones by name.
pub async fn run(config: &CliConfig, file: &str, force: bool) -> Result<()> {
    let registry = create_registry(config).await?;
    let descriptors = read_descriptors(file)?;
    print_info(&format!(
        "Registering {} table descriptor(s) from {}",
        descriptors.len(),
        file
    ));

    for descriptor in descriptors {
        let name = descriptor.name().to_string();
        let kind = descriptor.kind();
        match registry.register_features(Arc::new(descriptor), force).await {
            Ok(_) => print_success(&format!("Registered {} '{}'", kind, name)),
            Err(Error::AlreadyExists(name)) => {
                print_error(&format!(
                    "'{}' already exists. Use --force to overwrite.",
                    name
                ));
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to register '{}'", name));
            }
        }
    }

    Ok(())
}
