mod cmd;

use classtrib::core;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "classtrib", version, about = "IBS/CBS benefit and cClassTrib resolution for NCM codes")]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the benefits a single merchandise code qualifies for
    Resolve(cmd::resolve::ResolveCommand),
    /// Resolve a list of codes and report triage counts
    Batch(cmd::batch::BatchCommand),
    /// Classify an operation into a cClassTrib code
    Classify(cmd::classify::ClassifyCommand),
    /// Regime, test-year rates and cClassTrib for a code and operation
    Assess(cmd::assess::AssessCommand),
    /// Build hierarchical descriptions from the nomenclature table
    Enrich(cmd::enrich::EnrichCommand),
    /// Check a catalog and rule tables without resolving anything
    Validate(cmd::validate::ValidateCommand),
    /// Print expected input formats
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let opts = Opts::parse();
    match opts.command {
        Command::Resolve(resolve) => resolve.exec(),
        Command::Batch(batch) => batch.exec(),
        Command::Classify(classify) => classify.exec(),
        Command::Assess(assess) => assess.exec(),
        Command::Enrich(enrich) => enrich.exec(),
        Command::Validate(validate) => validate.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
