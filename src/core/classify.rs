use super::rules::{Movement, RuleTableError, RuleTables};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Precedence tier that produced a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Tier {
    /// Tier 1: consideration-free movement
    NonOnerous,
    /// Tier 2: reduced or zero-rate regime
    Regime,
    /// Tier 3: standard taxable outbound sale
    Generic,
    /// No tier matched
    Unclassified,
}

/// Evaluation order. The first tier that matches wins.
pub const TIER_ORDER: [Tier; 3] = [Tier::NonOnerous, Tier::Regime, Tier::Generic];

impl Tier {
    pub fn number(self) -> Option<u8> {
        match self {
            Tier::NonOnerous => Some(1),
            Tier::Regime => Some(2),
            Tier::Generic => Some(3),
            Tier::Unclassified => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.number() {
            Some(n) => write!(f, "{n}"),
            None => f.write_str("none"),
        }
    }
}

/// Inputs exactly as the caller supplied them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ClassificationInputs {
    pub operation: String,
    pub regime: String,
    pub situation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct Classification {
    pub tier: Tier,
    /// cClassTrib code; absent when unclassified
    pub code: Option<String>,
    pub rationale: String,
    pub inputs: ClassificationInputs,
}

impl Classification {
    pub fn is_classified(&self) -> bool {
        self.code.is_some()
    }
}

/// Inputs after cleanup, as the tiers see them
struct Cleaned {
    operation: String,
    regime: String,
    situation: String,
}

/// Tiered classification over validated rule tables.
///
/// Pure function of its three inputs and the tables; holds no other state.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: RuleTables,
    non_onerous: HashMap<String, Movement>,
}

impl Classifier {
    pub fn new(rules: RuleTables) -> Result<Self, RuleTableError> {
        let rules = rules.with_normalized_tags();
        rules.validate()?;
        let non_onerous = rules
            .non_onerous
            .iter()
            .map(|r| (r.operation.clone(), r.movement))
            .collect();
        log::debug!(
            "Classifier ready: rules '{}' effective {}",
            rules.version,
            rules.effective_from
        );
        Ok(Classifier { rules, non_onerous })
    }

    pub fn rules(&self) -> &RuleTables {
        &self.rules
    }

    /// Classify an operation. Never guesses: when no tier matches the
    /// result is `Tier::Unclassified` carrying the raw inputs.
    pub fn classify(&self, operation: &str, regime: &str, situation: &str) -> Classification {
        let inputs = ClassificationInputs {
            operation: operation.to_string(),
            regime: regime.to_string(),
            situation: situation.to_string(),
        };
        let cleaned = Cleaned {
            operation: digits(operation),
            regime: regime.trim().to_uppercase(),
            situation: digits(situation),
        };

        if cleaned.operation.len() != 4 {
            return unclassified(
                inputs,
                format!(
                    "Operation code '{operation}' is not a 4-digit CFOP; cannot classify."
                ),
            );
        }

        for tier in TIER_ORDER {
            let decision = match tier {
                Tier::NonOnerous => self.non_onerous_tier(&cleaned),
                Tier::Regime => self.regime_tier(&cleaned),
                Tier::Generic => self.generic_tier(&cleaned),
                Tier::Unclassified => None,
            };
            if let Some((code, rationale)) = decision {
                log::debug!(
                    "Classified CFOP {} / {} / CST {} at tier {} -> {}",
                    cleaned.operation,
                    cleaned.regime,
                    cleaned.situation,
                    tier,
                    code
                );
                return Classification {
                    tier,
                    code: Some(code),
                    rationale,
                    inputs,
                };
            }
        }

        log::debug!(
            "No tier matched CFOP {} / {} / CST {}",
            cleaned.operation,
            cleaned.regime,
            cleaned.situation
        );
        unclassified(
            inputs,
            format!(
                "No classification rule matches CFOP {} with regime '{}' and CST '{}'. \
                 Likely a special operation (return, bonus, shipment, warranty); review manually.",
                cleaned.operation, cleaned.regime, cleaned.situation
            ),
        )
    }

    fn non_onerous_tier(&self, input: &Cleaned) -> Option<(String, String)> {
        let movement = self.non_onerous.get(&input.operation)?;
        let code = self.rules.non_onerous_outcome.clone();
        let rationale = format!(
            "Non-onerous operation (CFOP {}, {}) -> cClassTrib {}. No consideration, so there \
             is no IBS/CBS tax base regardless of the product's regime.",
            input.operation,
            movement.label(),
            code
        );
        Some((code, rationale))
    }

    fn regime_tier(&self, input: &Cleaned) -> Option<(String, String)> {
        let rule = self
            .rules
            .regimes
            .iter()
            .find(|r| r.matcher.matches(&input.regime))?;
        let rationale = format!(
            "{} ({}) -> cClassTrib {}. Onerous operation with a legal rate reduction. Basis: {}.",
            rule.name,
            input.regime,
            rule.outcome,
            rule.basis_for(&input.regime)
        );
        Some((rule.outcome.clone(), rationale))
    }

    fn generic_tier(&self, input: &Cleaned) -> Option<(String, String)> {
        let fallback = &self.rules.fallback;
        if !fallback.is_outbound(&input.operation) || !fallback.is_standard(&input.situation) {
            return None;
        }
        let rationale = format!(
            "CFOP {} is a standard taxable outbound sale with CST {} -> cClassTrib {} \
             (regular taxation, no benefit).",
            input.operation, input.situation, fallback.outcome
        );
        Some((fallback.outcome.clone(), rationale))
    }
}

fn unclassified(inputs: ClassificationInputs, rationale: String) -> Classification {
    Classification {
        tier: Tier::Unclassified,
        code: None,
        rationale,
        inputs,
    }
}

fn digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rules::{
        NonOnerousRule, RegimeMatcher, NON_ONEROUS_CODE, REDUCED_60_CODE, STANDARD_CODE,
        ZERO_RATE_PRODUCE_CODE, ZERO_RATE_STAPLE_CODE,
    };

    fn classifier() -> Classifier {
        Classifier::new(RuleTables::lc214_2026()).unwrap()
    }

    #[test]
    fn tier_order_is_non_onerous_regime_generic() {
        assert_eq!(
            TIER_ORDER,
            [Tier::NonOnerous, Tier::Regime, Tier::Generic]
        );
    }

    #[test]
    fn repair_shipment_of_reduced_product_is_non_onerous() {
        let result = classifier().classify("5915", "RED_60_ALIMENTOS", "000");
        assert_eq!(result.tier, Tier::NonOnerous);
        assert_eq!(result.code.as_deref(), Some(NON_ONEROUS_CODE));
        assert!(result.rationale.contains("repair"));
    }

    #[test]
    fn gift_of_staple_product_is_non_onerous() {
        let result = classifier().classify("6910", "ALIQ_ZERO_CESTA_BASICA_NACIONAL", "000");
        assert_eq!(result.tier, Tier::NonOnerous);
        assert_eq!(result.code.as_deref(), Some(NON_ONEROUS_CODE));
    }

    #[test]
    fn domestic_sale_of_reduced_product_uses_regime() {
        let result = classifier().classify("5102", "RED_60_ALIMENTOS", "000");
        assert_eq!(result.tier, Tier::Regime);
        assert_eq!(result.code.as_deref(), Some(REDUCED_60_CODE));
        assert!(result.rationale.contains("Annex VII"));
    }

    #[test]
    fn every_60_percent_sub_category_shares_one_code() {
        let c = classifier();
        for tag in ["RED_60_ALIMENTOS", "RED_60_ESSENCIALIDADE", "red_60_saude"] {
            let result = c.classify("5102", tag, "000");
            assert_eq!(result.code.as_deref(), Some(REDUCED_60_CODE), "{tag}");
        }
    }

    #[test]
    fn zero_rate_regimes() {
        let c = classifier();
        let staple = c.classify("5102", "ALIQ_ZERO_CESTA_BASICA_NACIONAL", "000");
        assert_eq!(staple.code.as_deref(), Some(ZERO_RATE_STAPLE_CODE));
        let produce = c.classify("6102", "ALIQ_ZERO_HORTIFRUTI_OVOS", "000");
        assert_eq!(produce.code.as_deref(), Some(ZERO_RATE_PRODUCE_CODE));
    }

    #[test]
    fn standard_sale_falls_back_to_generic() {
        let result = classifier().classify("5102", "TRIBUTACAO_PADRAO", "000");
        assert_eq!(result.tier, Tier::Generic);
        assert_eq!(result.code.as_deref(), Some(STANDARD_CODE));
    }

    #[test]
    fn export_sale_is_structurally_outbound() {
        let result = classifier().classify("7.101", "", "900");
        assert_eq!(result.tier, Tier::Generic);
    }

    #[test]
    fn unknown_regime_and_non_standard_cst_is_unclassified() {
        let result = classifier().classify("5102", "SOMETHING_ELSE", "410");
        assert_eq!(result.tier, Tier::Unclassified);
        assert!(result.code.is_none());
        assert_eq!(
            result.inputs,
            ClassificationInputs {
                operation: "5102".to_string(),
                regime: "SOMETHING_ELSE".to_string(),
                situation: "410".to_string(),
            }
        );
    }

    #[test]
    fn inbound_return_is_unclassified_without_regime() {
        let result = classifier().classify("1202", "TRIBUTACAO_PADRAO", "000");
        assert_eq!(result.tier, Tier::Unclassified);
    }

    #[test]
    fn missing_operation_is_unclassified_even_with_regime() {
        let result = classifier().classify("", "RED_60_ALIMENTOS", "000");
        assert_eq!(result.tier, Tier::Unclassified);
        assert!(!result.is_classified());
    }

    #[test]
    fn punctuation_in_inputs_is_ignored() {
        let result = classifier().classify("5.910", " red_60_alimentos ", "0-00");
        assert_eq!(result.tier, Tier::NonOnerous);
        assert_eq!(result.inputs.operation, "5.910");
    }

    #[test]
    fn invalid_tables_are_refused() {
        let mut tables = RuleTables::lc214_2026();
        tables.version = String::new();
        assert!(Classifier::new(tables).is_err());
    }

    #[test]
    fn substitution_sale_in_non_onerous_table_is_refused() {
        let mut tables = RuleTables::lc214_2026();
        tables.non_onerous.push(NonOnerousRule {
            operation: "5405".to_string(),
            movement: Movement::OtherOutbound,
        });
        assert_eq!(
            Classifier::new(tables).unwrap_err(),
            RuleTableError::SaleListedAsNonOnerous("5405".to_string())
        );

        let result = classifier().classify("5405", "RED_60_ALIMENTOS", "000");
        assert_eq!(result.tier, Tier::Regime);
        assert_eq!(result.code.as_deref(), Some(REDUCED_60_CODE));
    }

    #[test]
    fn lower_case_matcher_still_classifies() {
        let mut tables = RuleTables::lc214_2026();
        tables.regimes[2].matcher = RegimeMatcher::Family("red_60".to_string());
        let result = Classifier::new(tables)
            .unwrap()
            .classify("5102", "red_60_saude", "000");
        assert_eq!(result.tier, Tier::Regime);
        assert_eq!(result.code.as_deref(), Some(REDUCED_60_CODE));
    }

    #[test]
    fn tier_display() {
        assert_eq!(Tier::NonOnerous.to_string(), "1");
        assert_eq!(Tier::Unclassified.to_string(), "none");
    }
}
