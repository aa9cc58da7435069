use super::catalog::{AnnexId, BenefitPattern, Catalog};
use super::code::{
    normalize_lookup, HierarchyLevel, InvalidCodeError, NormalizedCode, CANONICAL_WIDTH,
};
use super::warnings::Warning;
use rayon::prelude::*;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeSet;

/// A catalog pattern that structurally matches a merchandise code
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct BenefitMatch {
    pub annex: AnnexId,
    pub annex_description: String,
    /// Canonical pattern the code matched
    pub pattern: String,
    /// Pattern text as it appeared in the catalog source
    pub source_pattern: String,
    pub granularity: HierarchyLevel,
    /// True when the pattern is the full 8-digit code
    pub exact: bool,
    #[schemars(with = "f64")]
    pub reduction_fraction: Decimal,
}

impl BenefitMatch {
    fn from_pattern(pattern: &BenefitPattern) -> Self {
        BenefitMatch {
            annex: pattern.annex.clone(),
            annex_description: pattern.description.clone(),
            pattern: pattern.code.canonical().to_string(),
            source_pattern: pattern.source.clone(),
            granularity: pattern.code.level(),
            exact: pattern.code.width() == CANONICAL_WIDTH,
            reduction_fraction: pattern.reduction_fraction,
        }
    }

    /// Reduction as a whole percentage (60, 100)
    pub fn reduction_percent(&self) -> Decimal {
        (self.reduction_fraction * Decimal::ONE_HUNDRED).normalize()
    }
}

/// Every benefit a single code structurally qualifies for.
///
/// Ambiguity is reported, never resolved here.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Resolution {
    pub code: NormalizedCode,
    pub matches: Vec<BenefitMatch>,
    pub multi_enquadramento: bool,
}

impl Resolution {
    pub fn annexes(&self) -> BTreeSet<&AnnexId> {
        self.matches.iter().map(|m| &m.annex).collect()
    }

    pub fn has_benefit(&self) -> bool {
        !self.matches.is_empty()
    }

    pub fn is_out_of_scope(&self) -> bool {
        self.code.is_service_code()
    }

    /// Most specific match under `annex`, if the code qualifies for it
    pub fn match_for(&self, annex: &AnnexId) -> Option<&BenefitMatch> {
        self.matches
            .iter()
            .filter(|m| &m.annex == annex)
            .max_by_key(|m| m.pattern.len())
    }
}

/// Pad `raw` to a full merchandise code and collect every structurally
/// matching benefit
pub fn resolve(catalog: &Catalog, raw: &str) -> Result<Resolution, InvalidCodeError> {
    let code = normalize_lookup(raw)?;
    let matches: Vec<BenefitMatch> = catalog
        .find_matches(&code)
        .into_iter()
        .map(BenefitMatch::from_pattern)
        .collect();
    let distinct = matches
        .iter()
        .map(|m| &m.annex)
        .collect::<BTreeSet<_>>()
        .len();

    log::debug!(
        "Resolved {} -> {} ({} matches, {} annexes)",
        raw,
        code,
        matches.len(),
        distinct
    );

    Ok(Resolution {
        code,
        matches,
        multi_enquadramento: distinct > 1,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome {
    Resolved(Resolution),
    Invalid { error: InvalidCodeError },
}

/// Result for one line of a batch, in input position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    pub raw: String,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
    pub warnings: Vec<Warning>,
}

impl BatchEntry {
    fn resolve(catalog: &Catalog, raw: &str) -> Self {
        let (outcome, warnings) = match resolve(catalog, raw) {
            Ok(resolution) => {
                let mut warnings = Vec::new();
                if resolution.is_out_of_scope() {
                    warnings.push(Warning::ServiceCode);
                }
                if resolution.multi_enquadramento {
                    warnings.push(Warning::MultipleAnnexes {
                        annexes: resolution.annexes().into_iter().cloned().collect(),
                    });
                }
                (EntryOutcome::Resolved(resolution), warnings)
            }
            Err(error) => {
                let warnings = vec![Warning::InvalidCode {
                    reason: error.to_string(),
                }];
                (EntryOutcome::Invalid { error }, warnings)
            }
        };
        BatchEntry {
            raw: raw.to_string(),
            outcome,
            warnings,
        }
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        match &self.outcome {
            EntryOutcome::Resolved(resolution) => Some(resolution),
            EntryOutcome::Invalid { .. } => None,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Resolutions for an ordered sequence of codes plus batch-wide triage counts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResolution {
    pub entries: Vec<BatchEntry>,
    pub distinct_annexes_found: BTreeSet<AnnexId>,
    pub ambiguous_count: usize,
    pub failure_count: usize,
    pub service_count: usize,
    pub clean_count: usize,
}

/// The match chosen for one entry once a principal annex is fixed
#[derive(Debug, Clone, Copy)]
pub struct PrincipalSelection<'a> {
    pub entry: &'a BatchEntry,
    pub selected: Option<&'a BenefitMatch>,
}

impl BatchResolution {
    /// Apply one principal annex uniformly across the batch
    pub fn apply_principal_annex(&self, annex: &AnnexId) -> Vec<PrincipalSelection<'_>> {
        self.entries
            .iter()
            .map(|entry| PrincipalSelection {
                entry,
                selected: entry.resolution().and_then(|r| r.match_for(annex)),
            })
            .collect()
    }

    pub fn needs_principal_annex(&self) -> bool {
        self.ambiguous_count > 0
    }
}

/// Resolve every code independently. Entries are computed in parallel and
/// returned in input order; one malformed code never affects its siblings.
pub fn resolve_batch<S>(catalog: &Catalog, codes: &[S]) -> BatchResolution
where
    S: AsRef<str> + Sync,
{
    let entries: Vec<BatchEntry> = codes
        .par_iter()
        .map(|raw| BatchEntry::resolve(catalog, raw.as_ref()))
        .collect();

    let mut distinct_annexes_found = BTreeSet::new();
    let mut ambiguous_count = 0;
    let mut failure_count = 0;
    let mut service_count = 0;
    let mut clean_count = 0;

    for entry in &entries {
        match entry.resolution() {
            Some(resolution) => {
                distinct_annexes_found.extend(resolution.annexes().into_iter().cloned());
                if resolution.multi_enquadramento {
                    ambiguous_count += 1;
                }
                if resolution.is_out_of_scope() {
                    service_count += 1;
                }
            }
            None => failure_count += 1,
        }
        if entry.is_clean() {
            clean_count += 1;
        }
    }

    log::info!(
        "Batch of {}: {} clean, {} ambiguous, {} service, {} invalid, annexes {:?}",
        entries.len(),
        clean_count,
        ambiguous_count,
        service_count,
        failure_count,
        distinct_annexes_found
    );

    BatchResolution {
        entries,
        distinct_annexes_found,
        ambiguous_count,
        failure_count,
        service_count,
        clean_count,
    }
}
