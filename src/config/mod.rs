//! Process-wide engine configuration.

use std::fmt;
use std::path::Path;
use std::thread;

use anyhow::{self, format_err};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::io::format::nice_bool;
use crate::io::read_symblock_yaml;
use crate::quantum::SpinSymmetry;


fn default_quanta_threads() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

const fn default_true() -> bool {
    true
}

/// A structure containing the configuration read by every engine operation.
///
/// The configuration is fixed when an engine is constructed and never mutated afterwards.
#[derive(Clone, Builder, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// The number of worker threads for block-parallel loops.
    #[builder(default = "default_quanta_threads()")]
    #[serde(default = "default_quanta_threads")]
    pub quanta_threads: usize,

    /// Boolean indicating if spin labels are total spins, in which case recoupling coefficients
    /// are applied.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub spin_adapted: bool,
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.quanta_threads {
            Some(0) => Err("At least one worker thread is required.".to_string()),
            _ => Ok(()),
        }
    }
}

impl EngineConfig {
    /// Returns a builder to construct a new [`EngineConfig`].
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Reads a configuration from a YAML file.
    ///
    /// Missing fields take their default values. The result is validated as if it had been
    /// built with [`Self::builder`].
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let config: EngineConfig = read_symblock_yaml(path)?;
        Self::builder()
            .quanta_threads(config.quanta_threads)
            .spin_adapted(config.spin_adapted)
            .build()
            .map_err(|err| format_err!(err))
    }

    /// Returns the spin symmetry implied by [`Self::spin_adapted`].
    pub fn mode(&self) -> SpinSymmetry {
        SpinSymmetry::from_spin_adapted(self.spin_adapted)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quanta_threads: default_quanta_threads(),
            spin_adapted: true,
        }
    }
}

impl fmt::Display for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Worker threads for block loops: {}", self.quanta_threads)?;
        writeln!(f, "Spin-adapted coupling: {}", nice_bool(self.spin_adapted))?;
        writeln!(f)?;
        Ok(())
    }
}
