pub mod assessment;
pub mod benefits;
pub mod catalog;
pub mod classify;
pub mod code;
pub mod engine;
pub mod nomenclature;
pub mod rules;
pub mod warnings;

// Flat public surface for domain types and functions.
pub use assessment::{assess, regime_for_reduction, Assessment, AssessmentError, RateSchedule};
pub use benefits::{
    resolve, resolve_batch, BatchEntry, BatchResolution, BenefitMatch, EntryOutcome,
    PrincipalSelection, Resolution,
};
pub use catalog::{
    read_catalog_csv, read_catalog_json, AnnexId, BenefitPattern, Catalog, CatalogHandle,
    CatalogInput, CatalogLoadError, CatalogRow, OutOfScopeRow,
};
pub use classify::{Classification, ClassificationInputs, Classifier, Tier, TIER_ORDER};
pub use code::{normalize, normalize_lookup, HierarchyLevel, InvalidCodeError, NormalizedCode};
pub use engine::Engine;
pub use nomenclature::{read_nomenclature_csv, Nomenclature, NomenclatureRow};
pub use rules::{Movement, RuleTableError, RuleTables};
pub use warnings::Warning;
