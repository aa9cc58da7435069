//! Assess command - regime, test-year rates and cClassTrib for a code

use crate::cmd::classify::print_classification;
use crate::cmd::resolve::match_rows;
use crate::cmd::SourceArgs;
use crate::core::{AnnexId, Assessment};
use clap::Args;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct AssessCommand {
    /// Merchandise code, punctuation allowed
    code: String,

    /// Operation code (CFOP)
    #[arg(short, long, default_value = "5102")]
    operation: String,

    /// Tax situation code (CST)
    #[arg(short, long, default_value = "000")]
    situation: String,

    /// Principal annex, required when the code spans several annexes
    #[arg(short, long)]
    principal: Option<String>,

    #[command(flatten)]
    source: SourceArgs,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Tabled)]
struct RateRow {
    #[tabled(rename = "Tax")]
    tax: &'static str,
    #[tabled(rename = "Rate")]
    rate: String,
}

impl AssessCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let engine = self.source.engine()?;
        let principal = self.principal.as_deref().map(AnnexId::new);
        let assessment = engine.assess(
            &self.code,
            &self.operation,
            &self.situation,
            principal.as_ref(),
        )?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&assessment)?);
        } else {
            print_assessment(&assessment);
        }
        Ok(())
    }
}

fn print_assessment(assessment: &Assessment) {
    println!();
    println!("ASSESSMENT {}", assessment.resolution.code);
    println!();
    println!("Regime:       {}", assessment.regime);
    println!("Legal basis:  {}", assessment.legal_basis);
    if let Some(benefit) = &assessment.applied {
        println!(
            "Benefit:      {} via pattern {} ({}% reduction)",
            benefit.annex,
            benefit.source_pattern,
            benefit.reduction_percent()
        );
    }
    println!();

    if assessment.resolution.has_benefit() {
        let table = Table::new(match_rows(&assessment.resolution))
            .with(Style::rounded())
            .to_string();
        println!("{}", table);
        println!();
    }

    let rates = &assessment.rates;
    let rows = vec![
        RateRow {
            tax: "IBS (UF)",
            rate: format!("{}%", rates.ibs_uf),
        },
        RateRow {
            tax: "IBS (Mun)",
            rate: format!("{}%", rates.ibs_mun),
        },
        RateRow {
            tax: "CBS",
            rate: format!("{}%", rates.cbs),
        },
        RateRow {
            tax: "Total",
            rate: format!("{}%", rates.total()),
        },
    ];
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);

    print_classification(&assessment.classification);
}
