use super::benefits::{resolve, BenefitMatch, Resolution};
use super::catalog::{AnnexId, Catalog};
use super::classify::{Classification, Classifier};
use super::code::InvalidCodeError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::Serialize;

/// IBS (state) rate for the 2026 test year, in percent
pub const TEST_YEAR_IBS_UF: Decimal = dec!(0.10);
/// IBS (municipal) rate for the 2026 test year, in percent
pub const TEST_YEAR_IBS_MUN: Decimal = dec!(0.0);
/// CBS rate for the 2026 test year, in percent
pub const TEST_YEAR_CBS: Decimal = dec!(0.90);

pub const STANDARD_REGIME: &str = "TRIBUTACAO_PADRAO";
const STANDARD_BASIS: &str = "LC 214/2025, art. 10 general rule and ADCT art. 125 (test year)";

#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error(transparent)]
    InvalidCode(#[from] InvalidCodeError),
    #[error("{0} is a service code; merchandise benefits do not apply")]
    ServiceCode(String),
    #[error("{code} qualifies under several annexes ({}); choose a principal annex", .annexes.join(", "))]
    Ambiguous { code: String, annexes: Vec<String> },
    #[error("{code} does not qualify under principal annex {annex}")]
    AnnexNotMatched { code: String, annex: String },
}

/// Effective IBS/CBS rates, in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub struct RateSchedule {
    #[schemars(with = "f64")]
    pub ibs_uf: Decimal,
    #[schemars(with = "f64")]
    pub ibs_mun: Decimal,
    #[schemars(with = "f64")]
    pub cbs: Decimal,
}

impl RateSchedule {
    /// Test-year rates with `reduction` (a fraction) applied to each component
    pub fn test_year(reduction: Decimal) -> Self {
        let factor = Decimal::ONE - reduction;
        RateSchedule {
            ibs_uf: (TEST_YEAR_IBS_UF * factor).normalize(),
            ibs_mun: (TEST_YEAR_IBS_MUN * factor).normalize(),
            cbs: (TEST_YEAR_CBS * factor).normalize(),
        }
    }

    pub fn total(&self) -> Decimal {
        self.ibs_uf + self.ibs_mun + self.cbs
    }
}

/// Regime tag implied by a benefit's reduction
pub fn regime_for_reduction(reduction: Decimal) -> String {
    if reduction == Decimal::ONE {
        "ALIQ_ZERO_CESTA_BASICA_NACIONAL".to_string()
    } else if reduction == dec!(0.6) {
        "RED_60_ESSENCIALIDADE".to_string()
    } else if reduction.is_zero() {
        STANDARD_REGIME.to_string()
    } else {
        format!("RED_{}", (reduction * Decimal::ONE_HUNDRED).normalize())
    }
}

/// Full tax picture for one merchandise code and operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub resolution: Resolution,
    /// Benefit the assessment is based on, if any
    pub applied: Option<BenefitMatch>,
    pub regime: String,
    pub legal_basis: String,
    pub rates: RateSchedule,
    pub classification: Classification,
}

/// Resolve `code`, derive its regime and rates, and classify the operation.
///
/// A code qualifying under several annexes is only assessed once the caller
/// names a principal annex.
pub fn assess(
    catalog: &Catalog,
    classifier: &Classifier,
    code: &str,
    operation: &str,
    situation: &str,
    principal: Option<&AnnexId>,
) -> Result<Assessment, AssessmentError> {
    let resolution = resolve(catalog, code)?;
    if resolution.is_out_of_scope() {
        return Err(AssessmentError::ServiceCode(
            resolution.code.canonical().to_string(),
        ));
    }

    let applied = match principal {
        Some(annex) => Some(resolution.match_for(annex).cloned().ok_or_else(|| {
            AssessmentError::AnnexNotMatched {
                code: resolution.code.canonical().to_string(),
                annex: annex.to_string(),
            }
        })?),
        None if resolution.multi_enquadramento => {
            return Err(AssessmentError::Ambiguous {
                code: resolution.code.canonical().to_string(),
                annexes: resolution
                    .annexes()
                    .into_iter()
                    .map(|a| a.to_string())
                    .collect(),
            })
        }
        None => resolution
            .matches
            .iter()
            .max_by_key(|m| m.pattern.len())
            .cloned(),
    };

    let (regime, legal_basis, rates) = match &applied {
        Some(benefit) => (
            regime_for_reduction(benefit.reduction_fraction),
            format!("LC 214/2025, {}", benefit.annex),
            RateSchedule::test_year(benefit.reduction_fraction),
        ),
        None => (
            STANDARD_REGIME.to_string(),
            STANDARD_BASIS.to_string(),
            RateSchedule::test_year(Decimal::ZERO),
        ),
    };

    let classification = classifier.classify(operation, &regime, situation);
    log::debug!(
        "Assessed {} under {}: total {}%, cClassTrib {:?}",
        resolution.code,
        regime,
        rates.total(),
        classification.code
    );

    Ok(Assessment {
        resolution,
        applied,
        regime,
        legal_basis,
        rates,
        classification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::tests::sample_catalog;
    use crate::core::classify::Tier;
    use crate::core::rules::RuleTables;

    fn classifier() -> Classifier {
        Classifier::new(RuleTables::lc214_2026()).unwrap()
    }

    #[test]
    fn rates_scale_with_reduction() {
        let full = RateSchedule::test_year(Decimal::ZERO);
        assert_eq!(full.ibs_uf, dec!(0.10));
        assert_eq!(full.cbs, dec!(0.90));
        assert_eq!(full.total(), dec!(1.00));

        let reduced = RateSchedule::test_year(dec!(0.6));
        assert_eq!(reduced.ibs_uf, dec!(0.04));
        assert_eq!(reduced.cbs, dec!(0.36));
        assert_eq!(reduced.total(), dec!(0.40));

        let zero = RateSchedule::test_year(Decimal::ONE);
        assert!(zero.total().is_zero());
    }

    #[test]
    fn regime_tags_from_reduction() {
        assert_eq!(regime_for_reduction(dec!(1)), "ALIQ_ZERO_CESTA_BASICA_NACIONAL");
        assert_eq!(regime_for_reduction(dec!(0.60)), "RED_60_ESSENCIALIDADE");
        assert_eq!(regime_for_reduction(dec!(0)), STANDARD_REGIME);
        assert_eq!(regime_for_reduction(dec!(0.3)), "RED_30");
    }

    #[test]
    fn single_annex_code_is_assessed() {
        let catalog = sample_catalog();
        let assessment = assess(&catalog, &classifier(), "3101.00.00", "5102", "000", None).unwrap();
        assert_eq!(assessment.regime, "RED_60_ESSENCIALIDADE");
        assert_eq!(assessment.rates.total(), dec!(0.40));
        assert_eq!(assessment.classification.tier, Tier::Regime);
        assert_eq!(assessment.classification.code.as_deref(), Some("200034"));
    }

    #[test]
    fn code_without_benefit_is_standard() {
        let catalog = sample_catalog();
        let assessment = assess(&catalog, &classifier(), "84719014", "5102", "000", None).unwrap();
        assert!(assessment.applied.is_none());
        assert_eq!(assessment.regime, STANDARD_REGIME);
        assert_eq!(assessment.classification.code.as_deref(), Some("000001"));
    }

    #[test]
    fn ambiguous_code_requires_principal_annex() {
        let catalog = sample_catalog();
        let err = assess(&catalog, &classifier(), "30049099", "5102", "000", None).unwrap_err();
        assert!(matches!(err, AssessmentError::Ambiguous { .. }));

        let annex = AnnexId::new("ANEXO_XIV");
        let assessment =
            assess(&catalog, &classifier(), "30049099", "5102", "000", Some(&annex)).unwrap();
        assert_eq!(assessment.regime, "ALIQ_ZERO_CESTA_BASICA_NACIONAL");
        assert_eq!(assessment.applied.unwrap().annex, annex);
    }

    #[test]
    fn principal_annex_must_match() {
        let catalog = sample_catalog();
        let annex = AnnexId::new("ANEXO_IX");
        let err =
            assess(&catalog, &classifier(), "30049099", "5102", "000", Some(&annex)).unwrap_err();
        assert!(matches!(err, AssessmentError::AnnexNotMatched { .. }));
    }

    #[test]
    fn gift_of_benefited_product_stays_non_onerous() {
        let catalog = sample_catalog();
        let assessment = assess(&catalog, &classifier(), "31010000", "5910", "000", None).unwrap();
        assert_eq!(assessment.classification.tier, Tier::NonOnerous);
    }

    #[test]
    fn service_code_is_rejected() {
        let catalog = sample_catalog();
        let err = assess(&catalog, &classifier(), "101057000", "5102", "000", None).unwrap_err();
        assert!(matches!(err, AssessmentError::ServiceCode(_)));
    }
}
