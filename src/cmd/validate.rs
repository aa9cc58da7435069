//! Validate command - check the catalog and rule tables before they are served

use crate::cmd::{read_catalog_rows, SourceArgs};
use crate::core::{Catalog, Classifier};
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    #[command(flatten)]
    source: SourceArgs,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// A validation issue for output
#[derive(Debug, Clone, Serialize)]
struct ValidationIssue {
    source: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct CatalogSummary {
    patterns: usize,
    annexes: Vec<String>,
    out_of_scope_rows: Vec<usize>,
    fingerprint: String,
}

#[derive(Debug, Serialize)]
struct RulesSummary {
    version: String,
    effective_from: String,
    non_onerous_operations: usize,
    regimes: usize,
}

/// JSON output structure
#[derive(Debug, Serialize)]
struct ValidationOutput {
    issue_count: usize,
    issues: Vec<ValidationIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    catalog: Option<CatalogSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rules: Option<RulesSummary>,
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let mut issues = Vec::new();

        let catalog = read_catalog_rows(&self.source.catalog)
            .and_then(|rows| Ok(Catalog::build(rows)?))
            .map(|catalog| CatalogSummary {
                patterns: catalog.len(),
                annexes: catalog.annexes().into_iter().map(|a| a.to_string()).collect(),
                out_of_scope_rows: catalog.out_of_scope().iter().map(|r| r.row).collect(),
                fingerprint: catalog.fingerprint().to_string(),
            })
            .map_err(|e| {
                issues.push(ValidationIssue {
                    source: "catalog",
                    message: format!("{:#}", e),
                })
            })
            .ok();

        let rules = self
            .source
            .rules
            .load()
            .and_then(|tables| Ok(Classifier::new(tables)?))
            .map(|classifier| {
                let tables = classifier.rules();
                RulesSummary {
                    version: tables.version.clone(),
                    effective_from: tables.effective_from.format("%Y-%m-%d").to_string(),
                    non_onerous_operations: tables.non_onerous.len(),
                    regimes: tables.regimes.len(),
                }
            })
            .map_err(|e| {
                issues.push(ValidationIssue {
                    source: "rules",
                    message: format!("{:#}", e),
                })
            })
            .ok();

        let output = ValidationOutput {
            issue_count: issues.len(),
            issues,
            catalog,
            rules,
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_text(&output);
        }

        // Exit with code 1 if issues found
        if output.issue_count > 0 {
            std::process::exit(1);
        }
        Ok(())
    }
}

fn print_text(output: &ValidationOutput) {
    println!();
    println!("VALIDATION RESULTS");
    println!();

    if let Some(catalog) = &output.catalog {
        println!(
            "Catalog: {} patterns across {} annexes (fingerprint {})",
            catalog.patterns,
            catalog.annexes.len(),
            &catalog.fingerprint[..12]
        );
        if !catalog.out_of_scope_rows.is_empty() {
            let rows: Vec<_> = catalog
                .out_of_scope_rows
                .iter()
                .map(|r| r.to_string())
                .collect();
            println!("  Service codes excluded at rows: {}", rows.join(", "));
        }
    }
    if let Some(rules) = &output.rules {
        println!(
            "Rules:   {} effective {} ({} non-onerous operations, {} regimes)",
            rules.version, rules.effective_from, rules.non_onerous_operations, rules.regimes
        );
    }
    println!();

    if output.issues.is_empty() {
        println!("\u{2713} No issues found.");
    } else {
        println!("\u{26A0} {} issue(s) found:", output.issues.len());
        println!();
        for (i, issue) in output.issues.iter().enumerate() {
            println!("  {}. [{}] {}", i + 1, issue.source, issue.message);
        }
        println!();
    }
}
