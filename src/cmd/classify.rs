//! Classify command - cClassTrib for an operation

use crate::cmd::RulesArgs;
use crate::core::{Classification, Classifier};
use clap::Args;

#[derive(Args, Debug)]
pub struct ClassifyCommand {
    /// Operation code (CFOP), e.g. 5102 or 5.915
    operation: String,

    /// Regime tag, e.g. RED_60_ALIMENTOS or TRIBUTACAO_PADRAO
    regime: String,

    /// Tax situation code (CST)
    #[arg(default_value = "000")]
    situation: String,

    #[command(flatten)]
    rules: RulesArgs,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

impl ClassifyCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let classifier = Classifier::new(self.rules.load()?)?;
        let result = classifier.classify(&self.operation, &self.regime, &self.situation);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print_classification(&result);
        }
        Ok(())
    }
}

pub fn print_classification(result: &Classification) {
    println!();
    match &result.code {
        Some(code) => println!("cClassTrib {} (tier {})", code, result.tier),
        None => println!("\u{26A0} Unclassified"),
    }
    println!();
    println!("  {}", result.rationale);
}
