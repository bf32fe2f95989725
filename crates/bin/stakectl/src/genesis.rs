//! genesis file: registry config plus bootstrap validators

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use zeratul_staking::{Address, Balance, Config, Payout, StakingService};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub validator: Address,
    pub manager: Address,
    pub rate: u8,
    pub stake: Balance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genesis {
    pub config: Config,
    /// seeded through the bootstrap path (no minimum stake, no candidate cap)
    #[serde(default)]
    pub validators: Vec<GenesisValidator>,
}

impl Genesis {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading genesis {}", path.display()))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("parsing genesis json")
    }

    pub fn apply<P: Payout>(&self, service: &StakingService<P>) -> Result<()> {
        service.initialize_with(self.config.clone())?;
        for v in &self.validators {
            service
                .create_ledger(v.validator, v.manager, v.rate, v.stake)
                .with_context(|| format!("bootstrapping validator {}", v.validator))?;
        }
        info!(validators = self.validators.len(), "genesis applied");
        Ok(())
    }
}
