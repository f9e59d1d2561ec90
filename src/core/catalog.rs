//! In-process provider catalog
//!
//! `MemoryCatalog` keeps offers in a `DashMap` so request handlers can look up
//! prices while an operator updates statuses, without a global lock.

use dashmap::DashMap;
use primitive_types::U256;
use std::path::Path;
use tracing::info;

use crate::core::traits::Catalog;
use crate::types::{OfferStatus, ProviderOffer};

/// Thread-safe offer catalog keyed by node id
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    offers: DashMap<String, ProviderOffer>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-filled with the three launch GPU nodes
    pub fn seeded() -> Self {
        let catalog = Self::new();
        let finney = U256::from(1_000_000_000_000_000u64);
        for (node_id, wallet, descriptor, price) in [
            (
                "NODE_ALPHA",
                "0x1a2b000000000000000000000000000000000a11",
                "NVIDIA A100",
                finney * 10u64,
            ),
            (
                "NODE_BRAVO",
                "0x1a2b000000000000000000000000000000000b22",
                "RTX 3090",
                finney * 5u64,
            ),
            (
                "NODE_CHARLIE",
                "0x1a2b000000000000000000000000000000000c33",
                "H100",
                finney * 20u64,
            ),
        ] {
            catalog.upsert(ProviderOffer {
                node_id: node_id.to_string(),
                payout_wallet: wallet.to_string(),
                resource_descriptor: descriptor.to_string(),
                status: OfferStatus::Online,
                unit_price: price,
            });
        }
        catalog
    }

    /// Load offers from a JSON array of `ProviderOffer`
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogLoadError> {
        let contents = std::fs::read_to_string(path).map_err(|e| CatalogLoadError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let offers: Vec<ProviderOffer> =
            serde_json::from_str(&contents).map_err(|e| CatalogLoadError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let catalog = Self::new();
        for offer in offers {
            catalog.upsert(offer);
        }
        info!(offers = catalog.offers.len(), path = %path.display(), "catalog loaded");
        Ok(catalog)
    }

    /// Insert or replace an offer
    pub fn upsert(&self, offer: ProviderOffer) {
        self.offers.insert(offer.node_id.clone(), offer);
    }

    /// Change the status of an offer; returns `false` if the node is unknown
    pub fn set_status(&self, node_id: &str, status: OfferStatus) -> bool {
        match self.offers.get_mut(node_id) {
            Some(mut offer) => {
                offer.status = status;
                true
            }
            None => false,
        }
    }
}

impl Catalog for MemoryCatalog {
    fn lookup_offer(&self, node_id: &str) -> Option<ProviderOffer> {
        self.offers.get(node_id).map(|entry| entry.value().clone())
    }

    fn list_online_offers(&self) -> Vec<ProviderOffer> {
        let mut offers: Vec<ProviderOffer> = self
            .offers
            .iter()
            .filter(|entry| entry.value().is_online())
            .map(|entry| entry.value().clone())
            .collect();
        offers.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        offers
    }
}

/// Failure to load a catalog file
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogLoadError {
    #[error("Failed to read offers file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse offers file {path}: {message}")]
    Parse { path: String, message: String },
}
