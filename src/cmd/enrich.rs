//! Enrich command - hierarchical descriptions from the nomenclature table

use crate::cmd::read_nomenclature;
use crate::core::normalize;
use clap::Args;
use serde::Serialize;
use std::io;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct EnrichCommand {
    /// Nomenclature CSV (columns NCM, NCM_DESCRICAO or code, description)
    #[arg(short, long)]
    nomenclature: PathBuf,

    /// Enrich a single code instead of the whole table
    code: Option<String>,

    /// Leaf text for the single code. Defaults to the table's own text.
    #[arg(short, long, requires = "code")]
    leaf: Option<String>,

    /// Output as JSON instead of CSV
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct EnrichedRow<'a> {
    code: &'a str,
    description: &'a str,
}

impl EnrichCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let nomenclature = read_nomenclature(&self.nomenclature)?;

        if let Some(raw) = &self.code {
            let code = normalize(raw)?;
            let leaf = match (&self.leaf, nomenclature.text(code.canonical())) {
                (Some(leaf), _) => leaf.as_str(),
                (None, Some(text)) => text,
                (None, None) => anyhow::bail!(
                    "{} is not in the nomenclature table; pass --leaf to enrich it",
                    code
                ),
            };
            let enriched = nomenclature.enrich(&code, leaf);
            if self.json {
                let row = EnrichedRow {
                    code: code.canonical(),
                    description: &enriched,
                };
                println!("{}", serde_json::to_string_pretty(&row)?);
            } else {
                println!("{}", enriched);
            }
            return Ok(());
        }

        let enriched = nomenclature.enrich_all();
        if self.json {
            println!("{}", serde_json::to_string_pretty(&enriched)?);
        } else {
            let mut wtr = csv::Writer::from_writer(io::stdout());
            for (code, description) in &enriched {
                wtr.serialize(EnrichedRow { code, description })?;
            }
            wtr.flush()?;
        }
        Ok(())
    }
}
