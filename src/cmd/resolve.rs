//! Resolve command - benefits a merchandise code qualifies for

use crate::cmd::SourceArgs;
use crate::core::Resolution;
use clap::Args;
use serde::Serialize;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct ResolveCommand {
    /// Merchandise code, punctuation allowed (e.g. 0102.21.10)
    code: String,

    #[command(flatten)]
    source: SourceArgs,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

/// Row for the matches table output
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct MatchRow {
    #[tabled(rename = "Annex")]
    pub annex: String,

    #[tabled(rename = "Pattern")]
    pub pattern: String,

    #[tabled(rename = "Level")]
    pub level: String,

    #[tabled(rename = "Exact")]
    pub exact: String,

    #[tabled(rename = "Reduction")]
    pub reduction: String,

    #[tabled(rename = "Description")]
    pub description: String,
}

impl ResolveCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let engine = self.source.engine()?;
        let resolution = engine.resolve(&self.code)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        } else {
            print_resolution(&resolution);
        }
        Ok(())
    }
}

pub fn match_rows(resolution: &Resolution) -> Vec<MatchRow> {
    resolution
        .matches
        .iter()
        .map(|m| MatchRow {
            annex: m.annex.to_string(),
            pattern: m.source_pattern.clone(),
            level: m.granularity.to_string(),
            exact: if m.exact { "yes" } else { "" }.to_string(),
            reduction: format!("{}%", m.reduction_percent()),
            description: m.annex_description.clone(),
        })
        .collect()
}

fn print_resolution(resolution: &Resolution) {
    println!();
    println!(
        "{} ({})",
        resolution.code,
        resolution.code.level().label()
    );
    println!();

    if resolution.is_out_of_scope() {
        println!("Service code: merchandise benefits are not matched.");
        return;
    }
    if !resolution.has_benefit() {
        println!("No benefit found. Standard taxation applies.");
        return;
    }

    let table = Table::new(match_rows(resolution))
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::left()))
        .to_string();
    println!("{}", table);

    if resolution.multi_enquadramento {
        let annexes: Vec<_> = resolution.annexes().into_iter().map(|a| a.as_str()).collect();
        println!();
        println!(
            "\u{26A0} Multiple annexes ({}): choose a principal annex before assessing.",
            annexes.join(", ")
        );
    }
}
