//! Jurisdiction partitioning.
//!
//! Grouping never crosses a province boundary. Records are split into
//! disjoint per-province subsets before any other work happens, and records
//! whose jurisdiction is missing or unrecognised land in [`Province::Unknown`]
//! rather than being dropped.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::statute::Statute;

/// A recognised jurisdiction, or the catch-all `Unknown` bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Province {
    Federal,
    Punjab,
    Sindh,
    KhyberPakhtunkhwa,
    Balochistan,
    Islamabad,
    GilgitBaltistan,
    AzadKashmir,
    Unknown,
}

impl Province {
    pub const ALL: [Province; 9] = [
        Self::Federal,
        Self::Punjab,
        Self::Sindh,
        Self::KhyberPakhtunkhwa,
        Self::Balochistan,
        Self::Islamabad,
        Self::GilgitBaltistan,
        Self::AzadKashmir,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Federal => "federal",
            Self::Punjab => "punjab",
            Self::Sindh => "sindh",
            Self::KhyberPakhtunkhwa => "khyber_pakhtunkhwa",
            Self::Balochistan => "balochistan",
            Self::Islamabad => "islamabad",
            Self::GilgitBaltistan => "gilgit_baltistan",
            Self::AzadKashmir => "azad_kashmir",
            Self::Unknown => "unknown",
        }
    }

    /// Human-readable name used in prompts and display output.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Federal => "Federal",
            Self::Punjab => "Punjab",
            Self::Sindh => "Sindh",
            Self::KhyberPakhtunkhwa => "Khyber Pakhtunkhwa",
            Self::Balochistan => "Balochistan",
            Self::Islamabad => "Islamabad Capital Territory",
            Self::GilgitBaltistan => "Gilgit-Baltistan",
            Self::AzadKashmir => "Azad Jammu and Kashmir",
            Self::Unknown => "Unknown",
        }
    }

    /// Resolve a free-text jurisdiction label. Never fails: anything that is
    /// not recognised maps to [`Province::Unknown`].
    pub fn from_label(label: Option<&str>) -> Self {
        let Some(label) = label else {
            return Self::Unknown;
        };
        let key: String = label
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "federal" | "pakistan" | "central" | "federation" | "federalgovernment" => {
                Self::Federal
            }
            "punjab" => Self::Punjab,
            "sindh" | "sind" => Self::Sindh,
            "khyberpakhtunkhwa" | "kp" | "kpk" | "nwfp" | "northwestfrontierprovince" => {
                Self::KhyberPakhtunkhwa
            }
            "balochistan" | "baluchistan" => Self::Balochistan,
            "islamabad" | "ict" | "islamabadcapitalterritory" => Self::Islamabad,
            "gilgitbaltistan" | "gb" | "northernareas" => Self::GilgitBaltistan,
            "azadkashmir" | "ajk" | "azadjammuandkashmir" | "azadjammukashmir" => {
                Self::AzadKashmir
            }
            _ => Self::Unknown,
        }
    }

    pub fn of(statute: &Statute) -> Self {
        Self::from_label(statute.jurisdiction.as_deref())
    }
}

impl fmt::Display for Province {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split statute ids into disjoint per-province lists.
///
/// Exhaustive: every input id appears in exactly one bucket, in input order.
pub fn partition_by_province(statutes: &[Statute]) -> BTreeMap<Province, Vec<String>> {
    let mut partitions: BTreeMap<Province, Vec<String>> = BTreeMap::new();
    for statute in statutes {
        partitions
            .entry(Province::of(statute))
            .or_default()
            .push(statute.id.clone());
    }
    partitions
}
