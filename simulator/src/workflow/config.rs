use crate::generator::profile::CastScenario;
use anyhow::{bail, Context};
use ladcpcore::params::ProcessingParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One cast: where its records come from, how to process them and where the
/// merged profile goes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub params: ProcessingParams,
    /// Down-looker record files, in recording order.
    #[serde(default)]
    pub down_files: Vec<PathBuf>,
    #[serde(default)]
    pub up_files: Vec<PathBuf>,
    /// Generate records instead of reading files.
    #[serde(default)]
    pub synthetic: Option<CastScenario>,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .validate()
            .with_context(|| format!("checking workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    /// A synthetic cast with default processing parameters.
    pub fn from_args(ensembles: usize, down_bins: usize, lag: usize) -> Self {
        Self {
            params: ProcessingParams::default(),
            down_files: Vec::new(),
            up_files: Vec::new(),
            synthetic: Some(CastScenario {
                ensembles,
                down_bins,
                lag,
                ..CastScenario::default()
            }),
            output: None,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.synthetic.is_none() && self.down_files.is_empty() {
            bail!("no down-looker files and no synthetic scenario configured");
        }
        if self.synthetic.is_some() && !(self.down_files.is_empty() && self.up_files.is_empty()) {
            bail!("synthetic scenario and record files are mutually exclusive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ladcpcore::params::ResampleMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_builds_a_synthetic_cast() {
        let cfg = WorkflowConfig::from_args(120, 12, 4);
        let scenario = cfg.synthetic.as_ref().unwrap();
        assert_eq!(scenario.ensembles, 120);
        assert_eq!(scenario.lag, 4);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"params:\n  max_lag: 12\n  resample: up_to_down\n  down_bin_mask: [1]\ndown_files:\n  - dn001.json\n  - dn002.json\nup_files:\n  - up001.json\noutput: cast.json\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.params.max_lag, 12);
        assert_eq!(cfg.params.resample, ResampleMode::UpToDown);
        assert_eq!(cfg.params.percent_good_limit, 50.0);
        assert_eq!(cfg.down_files.len(), 2);
        assert_eq!(cfg.output, Some(PathBuf::from("cast.json")));
    }

    #[test]
    fn config_without_inputs_is_rejected() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"params:\n  max_lag: 12\n").unwrap();
        let path = temp.into_temp_path();
        assert!(WorkflowConfig::load(&path).is_err());
    }
}
