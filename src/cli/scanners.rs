//! Scanners command - list the configured scanner registry

use anyhow::Result;
use std::path::Path;

use vigil::config::Config;
use vigil::scanner::ScannerRegistry;

pub async fn scanners_command(work_dir: &Path) -> Result<i32> {
    let config = Config::from_dir(work_dir)?;
    let registry = ScannerRegistry::from_config(&config);

    if registry.is_empty() {
        println!("No scanners configured. Run `vigil init` to create a starter config.");
        return Ok(0);
    }

    println!("Configured scanners ({}):\n", registry.len());
    for descriptor in registry.descriptors() {
        let mut traits = Vec::new();
        if descriptor.provides_sbom {
            traits.push("provides sbom");
        }
        if descriptor.depends_on_sbom {
            traits.push("needs sbom");
        }
        if descriptor.slow {
            traits.push("slow");
        }
        let annotation = if traits.is_empty() {
            String::new()
        } else {
            format!(" [{}]", traits.join(", "))
        };
        println!(
            "  {:<16} {}{}",
            descriptor.name, descriptor.description, annotation
        );
    }
    Ok(0)
}
