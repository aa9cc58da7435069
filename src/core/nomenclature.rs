use super::catalog::CatalogLoadError;
use super::code::{normalize, HierarchyLevel, NormalizedCode};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// Separator placed between hierarchy fragments
pub const DELIMITER: &str = " > ";

/// Leaf descriptions longer than this (in characters) that carry no
/// hierarchy marker are taken as self-descriptive.
pub const SELF_DESCRIPTIVE_MIN_CHARS: usize = 50;

const MARKERS: [char; 3] = ['-', '–', '—'];

/// One line of the merchandise nomenclature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NomenclatureRow {
    #[serde(alias = "NCM")]
    pub code: String,
    #[serde(alias = "NCM_DESCRICAO")]
    pub description: String,
}

#[derive(Debug, Clone)]
struct Entry {
    code: NormalizedCode,
    description: String,
}

/// Representative text for each code of the nomenclature, at every
/// granularity the table provides.
#[derive(Debug, Clone, Default)]
pub struct Nomenclature {
    entries: BTreeMap<String, Entry>,
}

impl Nomenclature {
    pub fn build<I>(rows: I) -> Result<Self, CatalogLoadError>
    where
        I: IntoIterator<Item = NomenclatureRow>,
    {
        let mut entries = BTreeMap::new();
        let mut skipped = 0;

        for (i, row) in rows.into_iter().enumerate() {
            let code =
                normalize(&row.code).map_err(|error| CatalogLoadError::InvalidNomenclatureCode {
                    row: i + 1,
                    code: row.code.clone(),
                    error,
                })?;
            if code.is_service_code() {
                skipped += 1;
                continue;
            }
            let key = code.canonical().to_string();
            if entries.contains_key(&key) {
                log::debug!("Row {}: duplicate nomenclature code {}, keeping first", i + 1, key);
                continue;
            }
            entries.insert(
                key,
                Entry {
                    code,
                    description: row.description.trim().to_string(),
                },
            );
        }

        log::info!(
            "Built nomenclature: {} codes ({} service codes skipped)",
            entries.len(),
            skipped
        );
        Ok(Nomenclature { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Description recorded for an exact canonical code
    pub fn text(&self, canonical: &str) -> Option<&str> {
        self.entries.get(canonical).map(|e| e.description.as_str())
    }

    /// Prefix `leaf` with the text of every ancestor of `code`, coarsest
    /// first.
    ///
    /// Markers are stripped from every fragment and an ancestor whose text
    /// already appears in an earlier fragment is skipped. A long leaf with
    /// no leading marker is returned as given.
    pub fn enrich(&self, code: &NormalizedCode, leaf: &str) -> String {
        if is_self_descriptive(leaf) {
            return leaf.to_string();
        }

        let mut fragments: Vec<String> = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        for ancestor in code.ancestors() {
            let Some(text) = self.text(ancestor) else {
                continue;
            };
            let fragment = strip_hierarchy_markers(text);
            if fragment.is_empty() {
                continue;
            }
            let lower = fragment.to_lowercase();
            if seen.iter().any(|s| s.contains(&lower)) {
                continue;
            }
            seen.push(lower);
            fragments.push(fragment.to_string());
        }

        let leaf = strip_hierarchy_markers(leaf);
        if !leaf.is_empty() {
            fragments.push(leaf.to_string());
        }
        fragments.join(DELIMITER)
    }

    /// Enriched text for every full 8-digit code in the table
    pub fn enrich_all(&self) -> BTreeMap<String, String> {
        let enriched: BTreeMap<String, String> = self
            .entries
            .par_iter()
            .filter(|(_, e)| e.code.level() == HierarchyLevel::Subitem)
            .map(|(key, e)| (key.clone(), self.enrich(&e.code, &e.description)))
            .collect();
        log::info!("Enriched {} descriptions", enriched.len());
        enriched
    }
}

/// Remove leading dash markers (`-`, `–`, `—`, optionally spaced) and
/// surrounding whitespace
pub fn strip_hierarchy_markers(text: &str) -> &str {
    text.trim_start_matches(|c: char| MARKERS.contains(&c) || c.is_whitespace())
        .trim_end()
}

fn is_self_descriptive(leaf: &str) -> bool {
    let trimmed = leaf.trim_start();
    trimmed.chars().count() > SELF_DESCRIPTIVE_MIN_CHARS && !trimmed.starts_with(MARKERS)
}

/// Read nomenclature rows from CSV
pub fn read_nomenclature_csv<R: Read>(reader: R) -> Result<Vec<NomenclatureRow>, CatalogLoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let rows = rdr.deserialize().collect::<Result<Vec<NomenclatureRow>, _>>()?;
    log::info!("Read {} nomenclature rows", rows.len());
    Ok(rows)
}
