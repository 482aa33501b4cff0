//! Membership index — which ticker belongs to which sector and lists.
//!
//! Stored as a TOML file with a `[sectors]` table and a `[lists]` table, each
//! mapping a group name to its member tickers. A ticker belongs to at most one
//! sector and to any number of lists.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;

use crate::domain::{GroupId, GroupKind, GroupRegistry};

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("read membership file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse membership TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize membership: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("ticker '{ticker}' is assigned to both sector '{first}' and sector '{second}'")]
    ConflictingSector {
        ticker: String,
        first: String,
        second: String,
    },
}

/// On-disk layout of the membership file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MembershipFile {
    #[serde(default)]
    pub sectors: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub lists: BTreeMap<String, Vec<String>>,
}

/// Read-only lookup from ticker to its sector and lists.
#[derive(Debug, Clone, Default)]
pub struct MembershipIndex {
    sector_by_ticker: HashMap<String, String>,
    lists_by_ticker: HashMap<String, Vec<String>>,
    sectors: BTreeSet<String>,
    lists: BTreeSet<String>,
}

impl MembershipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self, MembershipError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, MembershipError> {
        let file: MembershipFile = toml::from_str(content)?;
        Self::from_parts(&file)
    }

    pub fn from_parts(file: &MembershipFile) -> Result<Self, MembershipError> {
        let mut index = Self::new();
        for (sector, tickers) in &file.sectors {
            index.sectors.insert(sector.clone());
            for ticker in tickers {
                index.add_to_sector(sector, ticker)?;
            }
        }
        for (list, tickers) in &file.lists {
            index.lists.insert(list.clone());
            for ticker in tickers {
                index.add_to_list(list, ticker);
            }
        }
        Ok(index)
    }

    /// Assign a ticker to a sector. Re-assigning the same sector is a no-op.
    pub fn add_to_sector(&mut self, sector: &str, ticker: &str) -> Result<(), MembershipError> {
        self.sectors.insert(sector.to_string());
        match self.sector_by_ticker.get(ticker) {
            Some(existing) if existing != sector => Err(MembershipError::ConflictingSector {
                ticker: ticker.to_string(),
                first: existing.clone(),
                second: sector.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.sector_by_ticker
                    .insert(ticker.to_string(), sector.to_string());
                Ok(())
            }
        }
    }

    /// Add a ticker to a list, keeping first-seen order and no duplicates.
    pub fn add_to_list(&mut self, list: &str, ticker: &str) {
        self.lists.insert(list.to_string());
        let lists = self.lists_by_ticker.entry(ticker.to_string()).or_default();
        if !lists.iter().any(|l| l == list) {
            lists.push(list.to_string());
        }
    }

    pub fn sector_of(&self, ticker: &str) -> Option<&str> {
        self.sector_by_ticker.get(ticker).map(|s| s.as_str())
    }

    pub fn lists_of(&self, ticker: &str) -> &[String] {
        self.lists_by_ticker
            .get(ticker)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn all_sectors(&self) -> &BTreeSet<String> {
        &self.sectors
    }

    pub fn all_lists(&self) -> &BTreeSet<String> {
        &self.lists
    }

    /// Resolve a ticker's groups to ids: its sector first, then its lists.
    ///
    /// Names the registry does not know are dropped.
    pub fn group_ids(&self, ticker: &str, registry: &GroupRegistry) -> Vec<GroupId> {
        let mut ids = Vec::new();
        if let Some(sector) = self.sector_of(ticker) {
            if let Some(id) = registry.id_of(GroupKind::Sector, sector) {
                ids.push(id);
            }
        }
        for list in self.lists_of(ticker) {
            if let Some(id) = registry.id_of(GroupKind::List, list) {
                ids.push(id);
            }
        }
        ids
    }

    /// Rebuild the on-disk layout (tickers sorted within each group).
    pub fn to_file_layout(&self) -> MembershipFile {
        let mut file = MembershipFile::default();
        for sector in &self.sectors {
            file.sectors.insert(sector.clone(), Vec::new());
        }
        for list in &self.lists {
            file.lists.insert(list.clone(), Vec::new());
        }
        for (ticker, sector) in &self.sector_by_ticker {
            if let Some(members) = file.sectors.get_mut(sector) {
                members.push(ticker.clone());
            }
        }
        for (ticker, lists) in &self.lists_by_ticker {
            for list in lists {
                if let Some(members) = file.lists.get_mut(list) {
                    members.push(ticker.clone());
                }
            }
        }
        for members in file.sectors.values_mut().chain(file.lists.values_mut()) {
            members.sort();
        }
        file
    }

    pub fn to_toml(&self) -> Result<String, MembershipError> {
        Ok(toml::to_string_pretty(&self.to_file_layout())?)
    }
}
