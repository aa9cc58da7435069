use super::assessment::{assess, Assessment, AssessmentError};
use super::benefits::{resolve, resolve_batch, BatchResolution, Resolution};
use super::catalog::{AnnexId, Catalog, CatalogHandle, CatalogLoadError, CatalogRow};
use super::classify::{Classification, Classifier};
use super::code::{normalize, InvalidCodeError};
use super::nomenclature::Nomenclature;
use super::rules::{RuleTableError, RuleTables};
use std::sync::Arc;

/// Published catalog plus validated rule tables.
///
/// Every call takes its own catalog snapshot, so a concurrent reload never
/// changes the rules a call started with.
#[derive(Debug)]
pub struct Engine {
    catalog: CatalogHandle,
    classifier: Classifier,
    nomenclature: Nomenclature,
}

impl Engine {
    pub fn new(catalog: Catalog, rules: RuleTables) -> Result<Self, RuleTableError> {
        Ok(Engine {
            catalog: CatalogHandle::new(catalog),
            classifier: Classifier::new(rules)?,
            nomenclature: Nomenclature::default(),
        })
    }

    /// Use `nomenclature` as the source of ancestor text for `enrich`
    pub fn with_nomenclature(mut self, nomenclature: Nomenclature) -> Self {
        self.nomenclature = nomenclature;
        self
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.snapshot()
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn resolve(&self, code: &str) -> Result<Resolution, InvalidCodeError> {
        resolve(&self.catalog.snapshot(), code)
    }

    pub fn resolve_batch<S>(&self, codes: &[S]) -> BatchResolution
    where
        S: AsRef<str> + Sync,
    {
        resolve_batch(&self.catalog.snapshot(), codes)
    }

    pub fn classify(&self, operation: &str, regime: &str, situation: &str) -> Classification {
        self.classifier.classify(operation, regime, situation)
    }

    pub fn assess(
        &self,
        code: &str,
        operation: &str,
        situation: &str,
        principal: Option<&AnnexId>,
    ) -> Result<Assessment, AssessmentError> {
        assess(
            &self.catalog.snapshot(),
            &self.classifier,
            code,
            operation,
            situation,
            principal,
        )
    }

    pub fn enrich(&self, code: &str, leaf: &str) -> Result<String, InvalidCodeError> {
        let code = normalize(code)?;
        Ok(self.nomenclature.enrich(&code, leaf))
    }

    /// Rebuild the catalog from `rows` and publish it. Returns the catalog
    /// that was replaced.
    pub fn reload<I>(&self, rows: I) -> Result<Arc<Catalog>, CatalogLoadError>
    where
        I: IntoIterator<Item = CatalogRow>,
    {
        self.catalog.reload(rows)
    }
}
