//! Batch command - resolve a list of codes with triage counts

use crate::cmd::{read_codes, SourceArgs};
use crate::core::{AnnexId, BatchEntry, BatchResolution, BenefitMatch};
use clap::Args;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct BatchCommand {
    /// File with one code per line. Reads from stdin if not specified.
    #[arg(default_value = "-")]
    file: PathBuf,

    #[command(flatten)]
    source: SourceArgs,

    /// Principal annex applied uniformly to every code (e.g. ANEXO_VII)
    #[arg(short, long)]
    principal: Option<String>,

    /// Output as JSON instead of formatted table
    #[arg(long, conflicts_with = "csv")]
    json: bool,

    /// Output as CSV instead of formatted table
    #[arg(long)]
    csv: bool,
}

/// Row for the batch table output
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct BatchRow {
    #[tabled(rename = "#")]
    pub row_num: usize,

    #[tabled(rename = "Input")]
    pub input: String,

    #[tabled(rename = "Code")]
    pub code: String,

    #[tabled(rename = "Annexes")]
    pub annexes: String,

    #[tabled(rename = "Selected")]
    pub selected: String,

    #[tabled(rename = "Reduction")]
    pub reduction: String,

    #[tabled(rename = "Warnings")]
    pub warnings: String,
}

#[derive(Debug, Serialize)]
struct BatchOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    principal_annex: Option<&'a AnnexId>,
    #[serde(flatten)]
    batch: &'a BatchResolution,
}

impl BatchCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let engine = self.source.engine()?;
        let codes = read_codes(&self.file)?;
        let batch = engine.resolve_batch(&codes);
        let principal = self.principal.as_deref().map(AnnexId::new);

        if self.json {
            let output = BatchOutput {
                principal_annex: principal.as_ref(),
                batch: &batch,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        let rows = build_rows(&batch, principal.as_ref());
        if self.csv {
            write_csv(&rows)
        } else {
            print_table(&rows, &batch, principal.as_ref());
            Ok(())
        }
    }
}

fn build_rows(batch: &BatchResolution, principal: Option<&AnnexId>) -> Vec<BatchRow> {
    let selected: Vec<Option<&BenefitMatch>> = match principal {
        Some(annex) => batch
            .apply_principal_annex(annex)
            .into_iter()
            .map(|s| s.selected)
            .collect(),
        None => batch.entries.iter().map(sole_annex_match).collect(),
    };

    batch
        .entries
        .iter()
        .zip(selected)
        .enumerate()
        .map(|(i, (entry, chosen))| BatchRow {
            row_num: i + 1,
            input: entry.raw.clone(),
            code: entry
                .resolution()
                .map(|r| r.code.to_string())
                .unwrap_or_default(),
            annexes: entry
                .resolution()
                .map(|r| {
                    r.annexes()
                        .into_iter()
                        .map(|a| a.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default(),
            selected: chosen.map(|m| m.annex.to_string()).unwrap_or_default(),
            reduction: chosen
                .map(|m| format!("{}%", m.reduction_percent()))
                .unwrap_or_default(),
            warnings: entry
                .warnings
                .iter()
                .map(|w| w.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        })
        .collect()
}

/// Most specific match when the entry is unambiguous
fn sole_annex_match(entry: &BatchEntry) -> Option<&BenefitMatch> {
    let resolution = entry.resolution()?;
    if resolution.multi_enquadramento {
        return None;
    }
    resolution.matches.iter().max_by_key(|m| m.pattern.len())
}

fn print_table(rows: &[BatchRow], batch: &BatchResolution, principal: Option<&AnnexId>) {
    if rows.is_empty() {
        println!("No codes to resolve");
        return;
    }

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::left()))
        .to_string();
    println!("{}", table);
    println!();

    let found: Vec<_> = batch
        .distinct_annexes_found
        .iter()
        .map(AnnexId::as_str)
        .collect();
    println!("Codes:          {}", batch.entries.len());
    println!("Clean:          {}", batch.clean_count);
    println!("Ambiguous:      {}", batch.ambiguous_count);
    println!("Service codes:  {}", batch.service_count);
    println!("Invalid:        {}", batch.failure_count);
    println!("Annexes found:  {}", found.join(", "));

    if batch.needs_principal_annex() && principal.is_none() {
        println!();
        println!(
            "\u{26A0} {} code(s) span several annexes. Re-run with --principal <ANNEX>.",
            batch.ambiguous_count
        );
    }
}

fn write_csv(rows: &[BatchRow]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(io::stdout());
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
