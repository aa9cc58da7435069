//! Schema command - print expected input formats

use crate::core::{CatalogInput, RuleTables};
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format: catalog, rules or csv-header
    #[arg(value_enum, default_value = "catalog")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the benefit catalog
    Catalog,
    /// JSON Schema for the classification rule tables
    Rules,
    /// CSV header row for the benefit catalog
    CsvHeader,
    /// Catalog CSV column descriptions
    CsvFields,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::Catalog => {
                let schema = schema_for!(CatalogInput);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::Rules => {
                let schema = schema_for!(RuleTables);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::CsvHeader => {
                let names: Vec<_> = CSV_FIELDS.iter().map(|(name, _, _)| *name).collect();
                println!("{}", names.join(","));
            }
            SchemaFormat::CsvFields => {
                println!("Catalog CSV Format");
                println!("==================");
                println!();
                for (name, alias, description) in CSV_FIELDS {
                    println!("{:20} ({:16})  {}", name, alias, description);
                }
                println!();
                println!("Spreadsheet header names are accepted in place of column names.");
            }
        }
        Ok(())
    }
}

const CSV_FIELDS: &[(&str, &str, &str)] = &[
    (
        "pattern",
        "NCM/IBS",
        "Merchandise code or prefix, 1 to 8 digits, punctuation allowed",
    ),
    ("annex", "ANEXO", "Statute annex granting the benefit"),
    ("description", "DESCRIÇÃO ANEXO", "Annex description (optional)"),
    (
        "reduction_fraction",
        "REDUÇÃO BASE",
        "Base reduction as a fraction: 0.6 or 1",
    ),
];
