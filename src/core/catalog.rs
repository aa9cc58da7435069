use super::code::{normalize, InvalidCodeError, NormalizedCode};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io::Read;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum CatalogLoadError {
    #[error("row {row}: invalid pattern '{pattern}': {error}")]
    InvalidPattern {
        row: usize,
        pattern: String,
        #[source]
        error: InvalidCodeError,
    },
    #[error("row {row}: annex is empty")]
    MissingAnnex { row: usize },
    #[error("row {row}: reduction {value} is outside [0, 1]")]
    ReductionOutOfRange { row: usize, value: Decimal },
    #[error("row {row}: invalid nomenclature code '{code}': {error}")]
    InvalidNomenclatureCode {
        row: usize,
        code: String,
        #[source]
        error: InvalidCodeError,
    },
    #[error("catalog contains no merchandise patterns")]
    Empty,
    #[error("failed to read CSV catalog source: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to read JSON catalog source: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read catalog source: {0}")]
    Io(#[from] std::io::Error),
}

/// Input root for a JSON catalog source
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CatalogInput {
    pub rows: Vec<CatalogRow>,
}

/// One benefit rule as supplied by the catalog source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CatalogRow {
    /// Merchandise code or prefix, 1 to 9 digits with arbitrary punctuation
    #[serde(alias = "NCM/IBS")]
    pub pattern: String,
    /// Statute annex granting the benefit (e.g. "ANEXO_VII")
    #[serde(alias = "ANEXO")]
    pub annex: String,
    /// Annex description
    #[serde(alias = "DESCRIÇÃO ANEXO", default)]
    pub description: String,
    /// Base reduction as a fraction: 0.6 for 60%, 1 for a zero rate
    #[serde(alias = "REDUÇÃO BASE")]
    #[schemars(with = "f64")]
    pub reduction_fraction: Decimal,
}

/// Identifier of a statute annex, upper-cased with whitespace collapsed to `_`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AnnexId(String);

impl AnnexId {
    pub fn new(raw: &str) -> Self {
        AnnexId(
            raw.split_whitespace()
                .collect::<Vec<_>>()
                .join("_")
                .to_uppercase(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AnnexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A catalog row after normalization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenefitPattern {
    /// 1-based row number in the source
    pub row: usize,
    /// Pattern text as it appeared in the source
    pub source: String,
    pub code: NormalizedCode,
    pub annex: AnnexId,
    pub description: String,
    pub reduction_fraction: Decimal,
}

/// A row excluded from the merchandise index because it names a service code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutOfScopeRow {
    pub row: usize,
    pub source: String,
    pub annex: AnnexId,
}

/// Immutable prefix index over the benefit rules.
///
/// Built once from the source rows and never mutated; a reload builds a
/// new `Catalog`.
#[derive(Debug)]
pub struct Catalog {
    patterns: Vec<BenefitPattern>,
    index: HashMap<String, Vec<usize>>,
    out_of_scope: Vec<OutOfScopeRow>,
    fingerprint: String,
}

impl Catalog {
    /// Normalize and index every row. Any malformed row fails the build.
    pub fn build<I>(rows: I) -> Result<Self, CatalogLoadError>
    where
        I: IntoIterator<Item = CatalogRow>,
    {
        let mut patterns = Vec::new();
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        let mut out_of_scope = Vec::new();
        let mut hasher = Sha256::new();

        for (i, row) in rows.into_iter().enumerate() {
            let row_num = i + 1;
            hash_row(&mut hasher, &row);

            let code = normalize(&row.pattern).map_err(|error| CatalogLoadError::InvalidPattern {
                row: row_num,
                pattern: row.pattern.clone(),
                error,
            })?;
            let annex = AnnexId::new(&row.annex);
            if annex.is_empty() {
                return Err(CatalogLoadError::MissingAnnex { row: row_num });
            }
            if row.reduction_fraction < Decimal::ZERO || row.reduction_fraction > Decimal::ONE {
                return Err(CatalogLoadError::ReductionOutOfRange {
                    row: row_num,
                    value: row.reduction_fraction,
                });
            }

            if code.is_service_code() {
                log::warn!(
                    "Row {}: service code {} ({}) excluded from merchandise index",
                    row_num,
                    code,
                    annex
                );
                out_of_scope.push(OutOfScopeRow {
                    row: row_num,
                    source: row.pattern,
                    annex,
                });
                continue;
            }

            index
                .entry(code.canonical().to_string())
                .or_default()
                .push(patterns.len());
            patterns.push(BenefitPattern {
                row: row_num,
                source: row.pattern,
                code,
                annex,
                description: row.description.trim().to_string(),
                reduction_fraction: row.reduction_fraction,
            });
        }

        if patterns.is_empty() {
            return Err(CatalogLoadError::Empty);
        }

        let catalog = Catalog {
            patterns,
            index,
            out_of_scope,
            fingerprint: hex::encode(hasher.finalize()),
        };
        log::info!(
            "Built catalog: {} patterns, {} annexes, {} out of scope, fingerprint {}",
            catalog.patterns.len(),
            catalog.annexes().len(),
            catalog.out_of_scope.len(),
            catalog.short_fingerprint()
        );
        Ok(catalog)
    }

    /// Every indexed pattern that is a prefix of `code` at any granularity,
    /// coarsest first. No precedence is applied.
    pub fn find_matches(&self, code: &NormalizedCode) -> Vec<&BenefitPattern> {
        code.match_prefixes()
            .filter_map(|prefix| self.index.get(prefix))
            .flatten()
            .map(|&i| &self.patterns[i])
            .collect()
    }

    pub fn patterns(&self) -> &[BenefitPattern] {
        &self.patterns
    }

    pub fn out_of_scope(&self) -> &[OutOfScopeRow] {
        &self.out_of_scope
    }

    pub fn annexes(&self) -> BTreeSet<&AnnexId> {
        self.patterns.iter().map(|p| &p.annex).collect()
    }

    /// SHA-256 of the source rows, hex encoded
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn short_fingerprint(&self) -> &str {
        &self.fingerprint[..12]
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn hash_row(hasher: &mut Sha256, row: &CatalogRow) {
    for field in [
        row.pattern.as_str(),
        row.annex.as_str(),
        row.description.as_str(),
    ] {
        hasher.update(field.as_bytes());
        hasher.update([0x1f]);
    }
    hasher.update(row.reduction_fraction.normalize().to_string().as_bytes());
    hasher.update([b'\n']);
}

/// Read catalog rows from CSV
pub fn read_catalog_csv<R: Read>(reader: R) -> Result<Vec<CatalogRow>, CatalogLoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let rows = rdr.deserialize().collect::<Result<Vec<CatalogRow>, _>>()?;
    log::info!("Read {} catalog rows", rows.len());
    Ok(rows)
}

/// Read catalog rows from JSON
pub fn read_catalog_json<R: Read>(reader: R) -> Result<Vec<CatalogRow>, CatalogLoadError> {
    let input: CatalogInput = serde_json::from_reader(reader)?;
    log::info!("Read {} catalog rows", input.rows.len());
    Ok(input.rows)
}

/// Shared pointer to the currently published catalog.
///
/// Readers clone the `Arc` and work on that snapshot; publishing swaps the
/// pointer, so no reader ever observes a partially built catalog.
#[derive(Debug)]
pub struct CatalogHandle {
    current: RwLock<Arc<Catalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: Catalog) -> Self {
        CatalogHandle {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the published catalog, returning the previous one
    pub fn publish(&self, catalog: Catalog) -> Arc<Catalog> {
        let next = Arc::new(catalog);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    /// Build a catalog from `rows` and publish it. On failure the current
    /// catalog stays published.
    pub fn reload<I>(&self, rows: I) -> Result<Arc<Catalog>, CatalogLoadError>
    where
        I: IntoIterator<Item = CatalogRow>,
    {
        let next = Catalog::build(rows).inspect_err(|e| {
            log::warn!("Catalog reload rejected, keeping current catalog: {}", e);
        })?;
        let fingerprint = next.short_fingerprint().to_string();
        let previous = self.publish(next);
        log::info!(
            "Published catalog {} (replacing {})",
            fingerprint,
            previous.short_fingerprint()
        );
        Ok(previous)
    }
}
