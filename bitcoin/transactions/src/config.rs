use bitcoin::Network;
use serde::{Deserialize, Serialize};

use crate::fee_rate::FeeRate;

/// What to do with a legacy (P2PKH) output whose previous transaction was
/// not supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LegacyPolicy {
    /// Describe the input with a witness-style value/script pair, tag it in
    /// the PSBT and report a [`crate::BuildWarning`].
    #[default]
    WitnessFallback,
    /// Refuse to bind the input.
    Strict,
}

/// Parameters shared by every send operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOptions {
    pub network: Network,
    pub fee_rate: FeeRate,
    #[serde(default = "default_enable_rbf")]
    pub enable_rbf: bool,
    #[serde(default)]
    pub legacy_policy: LegacyPolicy,
}

fn default_enable_rbf() -> bool {
    true
}

impl TxOptions {
    pub fn new(network: Network, fee_rate: FeeRate) -> Self {
        Self {
            network,
            fee_rate,
            enable_rbf: true,
            legacy_policy: LegacyPolicy::default(),
        }
    }

    pub fn with_rbf(mut self, enable_rbf: bool) -> Self {
        self.enable_rbf = enable_rbf;
        self
    }

    pub fn with_legacy_policy(mut self, legacy_policy: LegacyPolicy) -> Self {
        self.legacy_policy = legacy_policy;
        self
    }
}
