//! Static classification rule tables.
//!
//! The tables are plain data so they can be versioned alongside the statute,
//! loaded from JSON and validated before a classifier is built on them.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::ops::RangeInclusive;

/// cClassTrib for movements without consideration
pub const NON_ONEROUS_CODE: &str = "410999";
/// cClassTrib for the national staple basket (Annex I, zero rate)
pub const ZERO_RATE_STAPLE_CODE: &str = "200003";
/// cClassTrib for horticultural products, fruit and eggs (Annex XV, zero rate)
pub const ZERO_RATE_PRODUCE_CODE: &str = "200014";
/// cClassTrib shared by every 60% reduction
pub const REDUCED_60_CODE: &str = "200034";
/// cClassTrib for standard taxation without benefit
pub const STANDARD_CODE: &str = "000001";

/// CFOP suffixes (last three digits) of outbound sales. None of these may
/// appear in the non-onerous table.
pub const SALE_SUFFIXES: &[RangeInclusive<u16>] = &[
    101..=125, // production and merchandise
    251..=258, // electricity
    401..=405, // under tax substitution
    501..=502, // with specific export purpose (trading companies)
    651..=656, // fuel and lubricants
    667..=667, // fuel to an end consumer in another state
];

/// True when the last three digits of `operation` denote a sale
pub fn is_sale_operation(operation: &str) -> bool {
    operation
        .get(1..)
        .and_then(|suffix| suffix.parse::<u16>().ok())
        .is_some_and(|suffix| SALE_SUFFIXES.iter().any(|r| r.contains(&suffix)))
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RuleTableError {
    #[error("rule tables have no version")]
    MissingVersion,
    #[error("operation code '{0}' must be exactly 4 digits")]
    MalformedOperation(String),
    #[error("operation {0} is not an outbound movement")]
    NotOutbound(String),
    #[error("operation {0} is a sale and cannot be listed as non-onerous")]
    SaleListedAsNonOnerous(String),
    #[error("operation {0} is listed more than once")]
    DuplicateOperation(String),
    #[error("rule '{0}' has no outcome code")]
    MissingOutcome(String),
    #[error("regime rule '{0}' has an empty matcher")]
    EmptyMatcher(String),
    #[error("fallback rule needs at least one outbound prefix and one situation code")]
    IncompleteFallback,
}

/// Nature of a consideration-free movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Movement {
    Gift,
    Sample,
    Demonstration,
    Exhibition,
    Repair,
    Consignment,
    OtherOutbound,
}

impl Movement {
    pub fn label(self) -> &'static str {
        match self {
            Movement::Gift => "gift, donation or bonus",
            Movement::Sample => "free sample",
            Movement::Demonstration => "shipment for demonstration",
            Movement::Exhibition => "shipment for exhibition or fair",
            Movement::Repair => "shipment for repair",
            Movement::Consignment => "consignment shipment",
            Movement::OtherOutbound => "other unspecified outbound movement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NonOnerousRule {
    /// CFOP, 4 digits
    pub operation: String,
    pub movement: Movement,
}

/// How a regime rule recognises a tax-regime tag.
///
/// Tags are compared upper-cased. `Family` is a prefix match: `RED_60` covers
/// `RED_60_ALIMENTOS` but not `ALIQ_RED_60`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "match", content = "tag")]
pub enum RegimeMatcher {
    /// Tag equals this value
    Exact(String),
    /// Tag starts with this value (every sub-category of a family)
    Family(String),
}

impl RegimeMatcher {
    pub fn matches(&self, tag: &str) -> bool {
        match self {
            RegimeMatcher::Exact(value) => tag == value,
            RegimeMatcher::Family(prefix) => tag.starts_with(prefix.as_str()),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            RegimeMatcher::Exact(value) | RegimeMatcher::Family(value) => value.trim().is_empty(),
        }
    }

    fn normalize(&mut self) {
        match self {
            RegimeMatcher::Exact(value) | RegimeMatcher::Family(value) => {
                *value = value.trim().to_uppercase()
            }
        }
    }
}

/// Narrower legal basis quoted when the tag mentions `keyword`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BasisRefinement {
    pub keyword: String,
    pub legal_basis: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RegimeRule {
    pub name: String,
    pub matcher: RegimeMatcher,
    pub outcome: String,
    pub legal_basis: String,
    #[serde(default)]
    pub refinements: Vec<BasisRefinement>,
}

impl RegimeRule {
    /// Legal basis for `tag`, using the first refinement whose keyword it contains
    pub fn basis_for(&self, tag: &str) -> &str {
        self.refinements
            .iter()
            .find(|r| tag.contains(r.keyword.as_str()))
            .map_or(self.legal_basis.as_str(), |r| r.legal_basis.as_str())
    }
}

/// Structural rule for taxable outbound sales
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FallbackRule {
    /// Leading CFOP digits of outbound operations: domestic, interstate, export
    pub outbound_prefixes: Vec<char>,
    /// CST values that denote standard taxation
    pub standard_situations: Vec<String>,
    pub outcome: String,
}

impl FallbackRule {
    pub fn is_outbound(&self, operation: &str) -> bool {
        operation
            .chars()
            .next()
            .is_some_and(|c| self.outbound_prefixes.contains(&c))
    }

    pub fn is_standard(&self, situation: &str) -> bool {
        self.standard_situations.iter().any(|s| s == situation)
    }
}

/// Versioned rule tables backing the three classification tiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleTables {
    pub version: String,
    #[schemars(with = "String")]
    pub effective_from: NaiveDate,
    pub non_onerous_outcome: String,
    pub non_onerous: Vec<NonOnerousRule>,
    pub regimes: Vec<RegimeRule>,
    pub fallback: FallbackRule,
}

impl Default for RuleTables {
    fn default() -> Self {
        Self::lc214_2026()
    }
}

impl RuleTables {
    /// Tables for the 2026 test year of LC 214/2025
    pub fn lc214_2026() -> Self {
        let movements = [
            ("910", Movement::Gift),
            ("911", Movement::Sample),
            ("912", Movement::Demonstration),
            ("914", Movement::Exhibition),
            ("915", Movement::Repair),
            ("917", Movement::Consignment),
            ("949", Movement::OtherOutbound),
        ];
        let non_onerous = movements
            .iter()
            .flat_map(|(suffix, movement)| {
                ['5', '6', '7'].into_iter().map(move |scope| NonOnerousRule {
                    operation: format!("{scope}{suffix}"),
                    movement: *movement,
                })
            })
            .collect();

        RuleTables {
            version: "LC 214/2025 (2026 test year)".to_string(),
            effective_from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default(),
            non_onerous_outcome: NON_ONEROUS_CODE.to_string(),
            non_onerous,
            regimes: vec![
                RegimeRule {
                    name: "National staple basket".to_string(),
                    matcher: RegimeMatcher::Exact("ALIQ_ZERO_CESTA_BASICA_NACIONAL".to_string()),
                    outcome: ZERO_RATE_STAPLE_CODE.to_string(),
                    legal_basis: "LC 214/2025, Annex I".to_string(),
                    refinements: Vec::new(),
                },
                RegimeRule {
                    name: "Horticultural products, fruit and eggs".to_string(),
                    matcher: RegimeMatcher::Exact("ALIQ_ZERO_HORTIFRUTI_OVOS".to_string()),
                    outcome: ZERO_RATE_PRODUCE_CODE.to_string(),
                    legal_basis: "LC 214/2025, Annex XV".to_string(),
                    refinements: Vec::new(),
                },
                RegimeRule {
                    name: "60% reduction".to_string(),
                    matcher: RegimeMatcher::Family("RED_60".to_string()),
                    outcome: REDUCED_60_CODE.to_string(),
                    legal_basis: "LC 214/2025, arts. 137 to 145 (essentiality)".to_string(),
                    refinements: vec![BasisRefinement {
                        keyword: "ALIMENTO".to_string(),
                        legal_basis: "LC 214/2025, Annex VII (extended staple basket)"
                            .to_string(),
                    }],
                },
            ],
            fallback: FallbackRule {
                outbound_prefixes: vec!['5', '6', '7'],
                standard_situations: ["000", "200", "201", "202", "900"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                outcome: STANDARD_CODE.to_string(),
            },
        }
    }

    /// Read rule tables from JSON. The result is not validated; build a
    /// `Classifier` to validate.
    pub fn read_json<R: Read>(reader: R) -> anyhow::Result<Self> {
        let tables: RuleTables = serde_json::from_reader(reader)?;
        Ok(tables.with_normalized_tags())
    }

    /// Upper-case every regime matcher and refinement keyword, the form
    /// regime tags are compared in
    pub fn with_normalized_tags(mut self) -> Self {
        for rule in &mut self.regimes {
            rule.matcher.normalize();
            for refinement in &mut rule.refinements {
                refinement.keyword = refinement.keyword.trim().to_uppercase();
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), RuleTableError> {
        if self.version.trim().is_empty() {
            return Err(RuleTableError::MissingVersion);
        }
        if self.non_onerous_outcome.trim().is_empty() {
            return Err(RuleTableError::MissingOutcome("non-onerous".to_string()));
        }

        let mut seen = HashSet::new();
        for rule in &self.non_onerous {
            let op = rule.operation.as_str();
            if op.len() != 4 || !op.chars().all(|c| c.is_ascii_digit()) {
                return Err(RuleTableError::MalformedOperation(op.to_string()));
            }
            if !self.fallback.is_outbound(op) {
                return Err(RuleTableError::NotOutbound(op.to_string()));
            }
            if is_sale_operation(op) {
                return Err(RuleTableError::SaleListedAsNonOnerous(op.to_string()));
            }
            if !seen.insert(op) {
                return Err(RuleTableError::DuplicateOperation(op.to_string()));
            }
        }

        for rule in &self.regimes {
            if rule.matcher.is_empty() {
                return Err(RuleTableError::EmptyMatcher(rule.name.clone()));
            }
            if rule.outcome.trim().is_empty() {
                return Err(RuleTableError::MissingOutcome(rule.name.clone()));
            }
        }

        if self.fallback.outbound_prefixes.is_empty()
            || self.fallback.standard_situations.is_empty()
        {
            return Err(RuleTableError::IncompleteFallback);
        }
        if self.fallback.outcome.trim().is_empty() {
            return Err(RuleTableError::MissingOutcome("fallback".to_string()));
        }

        Ok(())
    }
}
