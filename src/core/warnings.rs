use super::catalog::AnnexId;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Triage markers attached to batch entries that are not clean successes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Warning {
    /// Code could not be normalized; the entry has no resolution.
    InvalidCode { reason: String },
    /// Service nomenclature code, outside the merchandise index.
    ServiceCode,
    /// Code qualifies under more than one annex; the caller must choose.
    MultipleAnnexes { annexes: Vec<AnnexId> },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::InvalidCode { reason } => write!(f, "invalid code: {reason}"),
            Warning::ServiceCode => f.write_str("service code, not matched"),
            Warning::MultipleAnnexes { annexes } => {
                let names: Vec<_> = annexes.iter().map(AnnexId::as_str).collect();
                write!(f, "multiple annexes: {}", names.join(", "))
            }
        }
    }
}
