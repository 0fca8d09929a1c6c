use anyhow::Context;
use ladcpcore::prelude::{StageError, StageResult};
use ladcpcore::record::{
    BottomTrack, FixedLeader, InstrumentRecord, RecordSource, VariableLeader, SENTINEL,
};
use log::debug;
use ndarray::{concatenate, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk form of one instrument file. Missing values are written as the
/// instrument sentinel, never as NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFile {
    pub leader: FixedLeader,
    pub ensembles: Vec<VariableLeader>,
    pub velocity: Array3<f64>,
    pub correlation: Array3<f64>,
    pub echo_amplitude: Array3<f64>,
    pub percent_good: Array3<f64>,
    /// Ensemble × 4 beam ranges then east/north/vertical/error.
    #[serde(default)]
    pub bottom_track: Option<Array2<f64>>,
    pub clock_year: i32,
}

fn to_sentinel(v: f64) -> f64 {
    if v.is_nan() {
        SENTINEL
    } else {
        v
    }
}

impl RecordFile {
    pub fn from_record(record: &InstrumentRecord) -> Self {
        let bottom_track = record.bottom_track.as_ref().and_then(|bt| {
            concatenate(Axis(1), &[bt.ranges(), bt.velocity()])
                .ok()
                .map(|raw| raw.mapv(to_sentinel))
        });
        Self {
            leader: record.leader.clone(),
            ensembles: record.ensembles.clone(),
            velocity: record.velocity.mapv(to_sentinel),
            correlation: record.correlation.mapv(to_sentinel),
            echo_amplitude: record.echo_amplitude.mapv(to_sentinel),
            percent_good: record.percent_good.mapv(to_sentinel),
            bottom_track,
            clock_year: record.clock_year,
        }
    }

    /// Validates the channels and converts bottom-track sentinels.
    pub fn into_record(self) -> StageResult<InstrumentRecord> {
        let bottom_track = self.bottom_track.map(BottomTrack::from_raw).transpose()?;
        InstrumentRecord::new(
            self.leader,
            self.ensembles,
            self.velocity,
            self.correlation,
            self.echo_amplitude,
            self.percent_good,
            bottom_track,
            self.clock_year,
        )
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(self).context("serializing record file")?;
        fs::write(path, json).with_context(|| format!("writing record file {}", path.display()))
    }
}

/// One instrument's record read from JSON files, concatenated in order.
pub struct JsonRecordSource {
    name: String,
    paths: Vec<PathBuf>,
}

impl JsonRecordSource {
    pub fn new(name: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            paths,
        }
    }

    fn read(path: &Path) -> StageResult<InstrumentRecord> {
        let contents = fs::read_to_string(path).map_err(|err| {
            StageError::SourceUnavailable(format!("{}: {}", path.display(), err))
        })?;
        let file: RecordFile = serde_json::from_str(&contents)
            .map_err(|err| StageError::InvalidInput(format!("{}: {}", path.display(), err)))?;
        file.into_record()
    }
}

impl RecordSource for JsonRecordSource {
    fn describe(&self) -> String {
        format!("{} ({} files)", self.name, self.paths.len())
    }

    fn load(&self) -> StageResult<InstrumentRecord> {
        if self.paths.is_empty() {
            return Err(StageError::SourceUnavailable(format!(
                "{}: no files configured",
                self.name
            )));
        }
        let parts = self
            .paths
            .iter()
            .map(|path| Self::read(path))
            .collect::<StageResult<Vec<_>>>()?;
        let mut record = InstrumentRecord::concatenate(parts)?;
        let masked = record.mask_sentinels();
        debug!("{}: {} sentinel samples masked", self.name, masked);
        Ok(record)
    }
}
