pub mod base_name;
pub mod cancel;
pub mod chains;
pub mod config;
pub mod dates;
pub mod group;
pub mod grouping;
pub mod province;
pub mod snippet;
pub mod statute;
pub mod tabular;
pub mod versioning;

pub use base_name::normalize_base_name;
pub use cancel::CancelFlag;
pub use chains::{ChainInput, detect_chains};
pub use config::{ConfigError, OracleConfig, RunConfig, ScopeConfig, SnippetConfig};
pub use dates::{DateSource, ResolvedDate, resolve_date};
pub use group::{
    AmendmentChain, ChainMember, GroupingMethod, InvariantViolation, NestedStatute, Relation,
    StatuteGroup,
};
pub use grouping::{BatchItem, GroupCandidate, ProposedGroup, fallback_groups};
pub use province::{Province, partition_by_province};
pub use snippet::{ContextSnippet, build_snippet};
pub use statute::{Section, Statute};
pub use versioning::{VersionInput, assign_versions};
