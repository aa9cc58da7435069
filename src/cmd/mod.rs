pub mod assess;
pub mod batch;
pub mod classify;
pub mod enrich;
pub mod resolve;
pub mod schema;
pub mod validate;

use crate::core::{
    read_catalog_csv, read_catalog_json, read_nomenclature_csv, Catalog, CatalogRow, Engine,
    Nomenclature, RuleTables,
};
use anyhow::Context;
use clap::Args;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// Where the benefit catalog and rule tables come from
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Benefit catalog (CSV or JSON, chosen by file extension)
    #[arg(short, long)]
    pub catalog: PathBuf,

    #[command(flatten)]
    pub rules: RulesArgs,
}

#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Classification rule tables (JSON). Defaults to the built-in 2026 tables.
    #[arg(short, long)]
    pub rules: Option<PathBuf>,
}

impl SourceArgs {
    pub fn engine(&self) -> anyhow::Result<Engine> {
        let catalog = Catalog::build(read_catalog_rows(&self.catalog)?)
            .with_context(|| format!("invalid catalog {}", self.catalog.display()))?;
        let engine = Engine::new(catalog, self.rules.load()?)?;
        Ok(engine)
    }
}

impl RulesArgs {
    pub fn load(&self) -> anyhow::Result<RuleTables> {
        match &self.rules {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("cannot open rule tables {}", path.display()))?;
                let tables = RuleTables::read_json(BufReader::new(file))?;
                log::info!("Loaded rule tables '{}' from {}", tables.version, path.display());
                Ok(tables)
            }
            None => Ok(RuleTables::lc214_2026()),
        }
    }
}

/// Read catalog rows, picking the format from the file extension
pub fn read_catalog_rows(path: &Path) -> anyhow::Result<Vec<CatalogRow>> {
    let file =
        File::open(path).with_context(|| format!("cannot open catalog {}", path.display()))?;
    let reader = BufReader::new(file);
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let rows = if is_json {
        read_catalog_json(reader)?
    } else {
        read_catalog_csv(reader)?
    };
    Ok(rows)
}

pub fn read_nomenclature(path: &Path) -> anyhow::Result<Nomenclature> {
    let file = File::open(path)
        .with_context(|| format!("cannot open nomenclature {}", path.display()))?;
    let rows = read_nomenclature_csv(BufReader::new(file))?;
    Ok(Nomenclature::build(rows)?)
}

/// Read one code per line from a file (or stdin with "-"). Blank lines and
/// lines starting with `#` are ignored.
pub fn read_codes(path: &Path) -> anyhow::Result<Vec<String>> {
    let codes = if path.as_os_str() == "-" {
        let stdin = io::stdin();
        let mut buffer = String::new();
        stdin.lock().read_to_string(&mut buffer)?;
        if buffer.is_empty() {
            anyhow::bail!("No input received. Provide a file or pipe codes to stdin.");
        }
        collect_codes(buffer.as_bytes())?
    } else {
        let file = File::open(path)?;
        collect_codes(BufReader::new(file))?
    };
    Ok(codes)
}

fn collect_codes<R: BufRead>(reader: R) -> anyhow::Result<Vec<String>> {
    let mut codes = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        codes.push(line.to_string());
    }
    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_codes_skipping_comments() {
        let input = "# codes\n0102.21.10\n\n  8471.90.14  \n";
        let codes = collect_codes(input.as_bytes()).unwrap();
        assert_eq!(codes, vec!["0102.21.10", "8471.90.14"]);
    }
}
