//! Durable output documents: statute groups and amendment chains.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::base_name::normalize_base_name;
use crate::dates::DateSource;
use crate::province::Province;
use crate::statute::Statute;

/// How a member relates to the original enactment of its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Original,
    Amendment,
    /// An amending ordinance, or a later member whose own title is an
    /// ordinance even when it stands as an independent instrument. A title
    /// mentioning "ordinance" is enough; names of targeted instruments in
    /// the snippet do not count.
    Ordinance,
    Repeal,
    Supplement,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Amendment => "amendment",
            Self::Ordinance => "ordinance",
            Self::Repeal => "repeal",
            Self::Supplement => "supplement",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "original" => Some(Self::Original),
            "amendment" => Some(Self::Amendment),
            "ordinance" => Some(Self::Ordinance),
            "repeal" => Some(Self::Repeal),
            "supplement" => Some(Self::Supplement),
            _ => None,
        }
    }
}

/// Which strategy produced a group's membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMethod {
    Oracle,
    Fallback,
}

impl GroupingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oracle => "oracle",
            Self::Fallback => "fallback",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "oracle" => Some(Self::Oracle),
            "fallback" => Some(Self::Fallback),
            _ => None,
        }
    }
}

/// A statute as a versioned member of a [`StatuteGroup`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedStatute {
    #[serde(flatten)]
    pub statute: Statute,
    /// 1-based, ascending by resolved date.
    pub version: u32,
    pub relation: Relation,
    pub is_original: bool,
    pub resolved_date: Option<NaiveDate>,
    pub date_source: Option<DateSource>,
    pub confidence: f32,
}

/// The reconstructed cluster of records believed to be versions of one
/// legal instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatuteGroup {
    pub id: String,
    pub run_id: String,
    pub base_name: String,
    pub jurisdiction: Province,
    pub method: GroupingMethod,
    pub members: Vec<NestedStatute>,
    pub original_id: String,
    pub member_count: usize,
    pub amendment_count: usize,
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A broken group invariant.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("group has no members")]
    Empty,
    #[error("group has {0} original members, expected exactly one")]
    OriginalCount(usize),
    #[error("declared member count {declared} does not match {actual} members")]
    MemberCount { declared: usize, actual: usize },
    #[error("member {statute_id} is in {found}, group is {expected}")]
    Jurisdiction {
        statute_id: String,
        expected: Province,
        found: Province,
    },
    #[error("versions are not the contiguous sequence 1..={0}")]
    Versions(usize),
    #[error("original_id {0} does not name the original member")]
    OriginalId(String),
}

impl StatuteGroup {
    /// Assemble a group from versioned members (already in version order).
    pub fn assemble(
        run_id: &str,
        jurisdiction: Province,
        method: GroupingMethod,
        members: Vec<NestedStatute>,
    ) -> Result<Self, InvariantViolation> {
        let original = members
            .iter()
            .find(|m| m.is_original)
            .ok_or(if members.is_empty() {
                InvariantViolation::Empty
            } else {
                InvariantViolation::OriginalCount(0)
            })?;

        let base_name = members
            .iter()
            .filter_map(|m| m.statute.title_str())
            .map(normalize_base_name)
            .next()
            .unwrap_or_default();
        let original_id = original.statute.id.clone();
        let confidence =
            members.iter().map(|m| m.confidence).sum::<f32>() / members.len() as f32;
        let now = Utc::now();

        let group = Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            base_name,
            jurisdiction,
            method,
            original_id,
            member_count: members.len(),
            amendment_count: members.iter().filter(|m| !m.is_original).count(),
            confidence,
            members,
            created_at: now,
            updated_at: now,
        };
        group.validate()?;
        Ok(group)
    }

    /// Check every group invariant.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if self.members.is_empty() {
            return Err(InvariantViolation::Empty);
        }
        let originals = self.members.iter().filter(|m| m.is_original).count();
        if originals != 1 {
            return Err(InvariantViolation::OriginalCount(originals));
        }
        if self.member_count != self.members.len() {
            return Err(InvariantViolation::MemberCount {
                declared: self.member_count,
                actual: self.members.len(),
            });
        }
        for member in &self.members {
            let found = Province::of(&member.statute);
            if found != self.jurisdiction {
                return Err(InvariantViolation::Jurisdiction {
                    statute_id: member.statute.id.clone(),
                    expected: self.jurisdiction,
                    found,
                });
            }
        }
        let contiguous = self
            .members
            .iter()
            .enumerate()
            .all(|(i, m)| m.version as usize == i + 1);
        if !contiguous {
            return Err(InvariantViolation::Versions(self.members.len()));
        }
        if !self
            .members
            .iter()
            .any(|m| m.is_original && m.statute.id == self.original_id)
        {
            return Err(InvariantViolation::OriginalId(self.original_id.clone()));
        }
        Ok(())
    }

    pub fn original(&self) -> Option<&NestedStatute> {
        self.members.iter().find(|m| m.is_original)
    }

    pub fn contains(&self, statute_id: &str) -> bool {
        self.members.iter().any(|m| m.statute.id == statute_id)
    }
}

/// One position in an [`AmendmentChain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMember {
    pub statute_id: String,
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    /// 0 is the base statute.
    pub position: usize,
    pub amendment_type: Relation,
}

/// An ordered lineage of statutes amending a common base statute.
///
/// Independent of group membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendmentChain {
    pub id: String,
    pub run_id: String,
    pub base_name: String,
    pub jurisdiction: Province,
    pub members: Vec<ChainMember>,
    pub amendment_count: usize,
    pub created_at: DateTime<Utc>,
}

impl AmendmentChain {
    pub fn base(&self) -> Option<&ChainMember> {
        self.members.first()
    }
}
