use crate::generator::profile::build_cast;
use crate::source::JsonRecordSource;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use ladcpcore::record::{MemorySource, MergedProfile, RecordSource};
use ladcpcore::CastAssembler;
use std::fs;
use std::path::Path;

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> anyhow::Result<MergedProfile> {
        let assembler = CastAssembler::new(self.config.params.clone());

        if let Some(scenario) = &self.config.synthetic {
            let cast = build_cast(scenario).context("generating synthetic cast")?;
            let down = MemorySource::new("synthetic down-looker", cast.down);
            let up = cast
                .up
                .map(|record| MemorySource::new("synthetic up-looker", record));
            return assembler
                .assemble_from_sources(&down, up.as_ref().map(|s| s as &dyn RecordSource))
                .context("assembling synthetic cast");
        }

        let down = JsonRecordSource::new("down-looker", self.config.down_files.clone());
        let up = if self.config.up_files.is_empty() {
            None
        } else {
            Some(JsonRecordSource::new(
                "up-looker",
                self.config.up_files.clone(),
            ))
        };
        assembler
            .assemble_from_sources(&down, up.as_ref().map(|s| s as &dyn RecordSource))
            .context("assembling cast")
    }

    pub fn write_profile<P: AsRef<Path>>(profile: &MergedProfile, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
        let json = profile.to_json().context("serializing merged profile")?;
        fs::write(path, json).with_context(|| format!("writing profile {}", path.display()))
    }
}

/// One-line description of a finished cast.
pub fn summarize(profile: &MergedProfile) -> String {
    let lag = profile
        .alignment
        .as_ref()
        .map(|a| format!("lag {} (r = {:.3})", a.lag, a.correlation))
        .unwrap_or_else(|| "single instrument".to_string());
    format!(
        "{} ensembles, {} depth rows ({} up + {} down), {}, {} warnings",
        profile.n_ensembles(),
        profile.n_depth(),
        profile.up_bins,
        profile.down_bins,
        lag,
        profile.warnings.len()
    )
}
