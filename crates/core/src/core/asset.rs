//! Tokenized asset holdings as seen from the local node.

use hashbrown::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One tokenized asset: the local balance and the total supply in circulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Asset {
    pub balance: u64,
    pub total_supply: u64,
}

impl Asset {
    pub fn new(balance: u64, total_supply: u64) -> Self {
        Self {
            balance,
            total_supply,
        }
    }
}

/// The local node's view of its own holdings, keyed by asset name.
///
/// The remote node is authoritative; the whole book is replaced on every
/// asset-list refresh rather than patched entry by entry.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct AssetBook {
    assets: HashMap<String, Asset>,
}

impl AssetBook {
    pub fn new() -> Self {
        Self {
            assets: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, asset: Asset) {
        self.assets.insert(name.into(), asset);
    }

    /// Wholesale replacement after a refresh.
    pub fn replace_all(&mut self, fresh: AssetBook) {
        self.assets = fresh.assets;
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    /// The local balance for `name`, zero if the asset is unknown.
    pub fn balance_of(&self, name: &str) -> u64 {
        self.assets.get(name).map(|a| a.balance).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Asset)> {
        self.assets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_of_unknown_asset_is_zero() {
        let book = AssetBook::new();
        assert_eq!(book.balance_of("ACME"), 0);
    }

    #[test]
    fn replace_all_drops_stale_entries() {
        let mut book = AssetBook::new();
        book.insert("ACME", Asset::new(100, 1000));
        book.insert("GLOBEX", Asset::new(5, 50));

        let mut fresh = AssetBook::new();
        fresh.insert("ACME", Asset::new(80, 1000));
        book.replace_all(fresh);

        assert_eq!(book.len(), 1);
        assert_eq!(book.balance_of("ACME"), 80);
        assert_eq!(book.balance_of("GLOBEX"), 0);
    }
}
