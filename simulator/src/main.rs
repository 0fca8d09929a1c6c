use anyhow::{bail, Context};
use clap::Parser;
use generator::profile::build_cast;
use log::info;
use source::RecordFile;
use std::fs;
use std::path::PathBuf;
use workflow::config::WorkflowConfig;
use workflow::runner::{summarize, Runner};

mod generator;
mod source;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "LADCP cast processing driver")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Process a generated cast instead of record files
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    #[arg(long, default_value_t = 400)]
    ensembles: usize,
    #[arg(long, default_value_t = 20)]
    bins: usize,
    /// Up-looker lag of the generated cast, in ensembles
    #[arg(long, default_value_t = 5)]
    lag: usize,
    /// Write the merged profile as JSON (overrides the workflow output)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Write the generated records to this directory as record files
    #[arg(long)]
    export_records: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = match (&args.workflow, args.synthetic) {
        (Some(path), _) => WorkflowConfig::load(path)?,
        (None, true) => WorkflowConfig::from_args(args.ensembles, args.bins, args.lag),
        (None, false) => bail!("either --workflow or --synthetic is required"),
    };

    if let Some(dir) = &args.export_records {
        let Some(scenario) = &workflow_config.synthetic else {
            bail!("--export-records needs a synthetic scenario");
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("creating record directory {}", dir.display()))?;
        let cast = build_cast(scenario)?;
        RecordFile::from_record(&cast.down).write(dir.join("down.json"))?;
        if let Some(up) = &cast.up {
            RecordFile::from_record(up).write(dir.join("up.json"))?;
        }
        info!("synthetic records written to {}", dir.display());
    }

    let runner = Runner::new(workflow_config.clone());
    let profile = runner.execute()?;
    for message in &profile.warnings {
        println!("  warning: {}", message);
    }
    println!("Cast processed -> {}", summarize(&profile));

    if let Some(path) = args.output.or(workflow_config.output) {
        Runner::write_profile(&profile, &path)?;
        println!("Merged profile written to {}", path.display());
    }

    Ok(())
}
