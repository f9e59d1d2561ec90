//! Provider offers sold through the ledger

use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Availability of a provider node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Online,
    Offline,
}

/// A resource allocation a provider sells at a fixed unit price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOffer {
    /// Unique node id used by renters to pick the offer
    pub node_id: String,
    /// Wallet credited with the provider's net share
    pub payout_wallet: String,
    /// Free-form description of what is rented (e.g. a GPU model)
    pub resource_descriptor: String,
    pub status: OfferStatus,
    /// Price per rental in the chain's smallest unit
    pub unit_price: U256,
}

impl ProviderOffer {
    pub fn is_online(&self) -> bool {
        self.status == OfferStatus::Online
    }
}
