use crate::prelude::{StageError, StageResult};
use crate::record::InstrumentRecord;

/// Supplier of one instrument's already-parsed record.
///
/// Implementations own all file access. Sentinel values must be converted
/// to NaN before the record is returned.
pub trait RecordSource {
    /// Human-readable name used in log and error messages.
    fn describe(&self) -> String;

    fn load(&self) -> StageResult<InstrumentRecord>;
}

/// Source backed by records that are already in memory.
pub struct MemorySource {
    name: String,
    parts: Vec<InstrumentRecord>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, record: InstrumentRecord) -> Self {
        Self::from_parts(name, vec![record])
    }

    /// Several records of one instrument, concatenated on load.
    pub fn from_parts(name: impl Into<String>, parts: Vec<InstrumentRecord>) -> Self {
        Self {
            name: name.into(),
            parts,
        }
    }
}

impl RecordSource for MemorySource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn load(&self) -> StageResult<InstrumentRecord> {
        if self.parts.is_empty() {
            return Err(StageError::SourceUnavailable(format!(
                "{}: no records",
                self.name
            )));
        }
        let mut record = InstrumentRecord::concatenate(self.parts.clone())?;
        record.mask_sentinels();
        Ok(record)
    }
}
