use crate::routing::NodeOrdering;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Réglages d'ordonnancement (fichier JSON, tous les champs optionnels).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Comparateur de `node_number` ; `lexical` reproduit le tri de chaînes.
    pub node_ordering: NodeOrdering,
    /// Sans poste déclaré, prend le poste de l'opération s'il est unique.
    pub derive_workstation_from_operation: bool,
    /// Signale deux occurrences simultanées du même nœud.
    pub check_same_component: bool,
    pub conflict_horizon_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            node_ordering: NodeOrdering::Lexical,
            derive_workstation_from_operation: true,
            check_same_component: true,
            conflict_horizon_days: 30,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.conflict_horizon_days == 0 {
            bail!("conflict_horizon_days must be > 0");
        }
        Ok(())
    }

    /// Charge la configuration ; fichier absent = valeurs par défaut.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = serde_json::from_slice(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }
}
