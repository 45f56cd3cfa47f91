//! Explicit scanner registry
//!
//! Built once at startup from config and passed by reference into the
//! orchestrator. No global state: tests register fakes on a fresh registry
//! without touching process-wide anything.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{Result, VigilError};

use super::{CommandScanner, Scanner, ScannerDescriptor};

#[derive(Default)]
pub struct ScannerRegistry {
    scanners: BTreeMap<String, Arc<dyn Scanner>>,
}

impl ScannerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the `[scanner.<name>]` config tables.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for (name, scanner_config) in &config.scanner {
            registry.register(CommandScanner::from_config(name, scanner_config));
        }
        registry
    }

    /// Register a scanner. A later registration under the same name wins.
    pub fn register<S: Scanner + 'static>(&mut self, scanner: S) {
        self.scanners
            .insert(scanner.name().to_string(), Arc::new(scanner));
    }

    pub fn register_arc(&mut self, scanner: Arc<dyn Scanner>) {
        self.scanners.insert(scanner.name().to_string(), scanner);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Scanner>> {
        self.scanners.get(name).cloned()
    }

    /// Registered scanner names, sorted
    pub fn names(&self) -> Vec<String> {
        self.scanners.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.scanners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }

    /// Immutable descriptors for listings
    pub fn descriptors(&self) -> Vec<ScannerDescriptor> {
        self.scanners
            .values()
            .map(|s| ScannerDescriptor {
                name: s.name().to_string(),
                description: s.description().to_string(),
                provides_sbom: s.provides_sbom(),
                depends_on_sbom: s.depends_on_sbom(),
                slow: s.is_slow(),
            })
            .collect()
    }

    /// Resolve scanner names to instances, preserving order.
    ///
    /// Any unknown name is a configuration error raised before the run
    /// starts.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<dyn Scanner>>> {
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            let scanner = self
                .get(name)
                .ok_or_else(|| VigilError::Config(format!("scanner not found: {}", name)))?;
            resolved.push(scanner);
        }
        Ok(resolved)
    }
}

impl std::fmt::Debug for ScannerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerRegistry")
            .field("scanners", &self.names())
            .finish()
    }
}
