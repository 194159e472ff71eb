use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use percload_core::{AssetId, BackgroundCategory, ExperimentError, Load, TrialResult};
use serde::{Deserialize, Serialize};

/// Append-only sink for trial results
pub trait ResultLog {
    fn write_result(&mut self, result: &TrialResult) -> Result<(), ExperimentError>;

    fn flush(&mut self) -> Result<(), ExperimentError> {
        Ok(())
    }
}

impl ResultLog for Vec<TrialResult> {
    fn write_result(&mut self, result: &TrialResult) -> Result<(), ExperimentError> {
        self.push(result.clone());
        Ok(())
    }
}

/// One line of the result file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    pub participant: String,
    pub session: String,
    pub trial_index: usize,
    pub load: Load,
    pub background_category: BackgroundCategory,
    pub background_asset: AssetId,
    pub letter_string: String,
    pub target_present: bool,
    pub response_key: Option<String>,
    /// Milliseconds.
    pub reaction_time: Option<f64>,
    pub correct: bool,
}

impl LogRow {
    pub fn new(participant: &str, session: &str, result: &TrialResult) -> Self {
        Self {
            participant: participant.to_string(),
            session: session.to_string(),
            trial_index: result.trial_index,
            load: result.load,
            background_category: result.background_category,
            background_asset: result.background_asset.clone(),
            letter_string: result.letter_string.clone(),
            target_present: result.target_present,
            response_key: result.response_key.clone(),
            reaction_time: result.reaction_time_ms,
            correct: result.correct,
        }
    }

    pub fn into_result(self) -> TrialResult {
        TrialResult {
            trial_index: self.trial_index,
            load: self.load,
            background_category: self.background_category,
            background_asset: self.background_asset,
            letter_string: self.letter_string,
            target_present: self.target_present,
            response_key: self.response_key,
            reaction_time_ms: self.reaction_time,
            correct: self.correct,
        }
    }
}

fn log_error(e: csv::Error) -> ExperimentError {
    ExperimentError::Log(e.to_string())
}

/// CSV result file, flushed after every row so a crash after trial k
/// leaves rows 1..=k on disk.
pub struct CsvResultLog<W: Write> {
    writer: csv::Writer<W>,
    participant: String,
    session: String,
    rows: usize,
}

impl CsvResultLog<File> {
    pub fn create<P: AsRef<Path>>(
        path: P,
        participant: &str,
        session: &str,
    ) -> Result<Self, ExperimentError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self::from_writer(file, participant, session))
    }
}

impl<W: Write> CsvResultLog<W> {
    pub fn from_writer(writer: W, participant: &str, session: &str) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            participant: participant.to_string(),
            session: session.to_string(),
            rows: 0,
        }
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> Result<W, ExperimentError> {
        self.writer
            .into_inner()
            .map_err(|e| ExperimentError::Log(e.to_string()))
    }
}

impl<W: Write> ResultLog for CsvResultLog<W> {
    fn write_result(&mut self, result: &TrialResult) -> Result<(), ExperimentError> {
        let row = LogRow::new(&self.participant, &self.session, result);
        self.writer.serialize(&row).map_err(log_error)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ExperimentError> {
        self.writer.flush()?;
        Ok(())
    }
}

pub fn read_log<R: Read>(reader: R) -> Result<Vec<LogRow>, ExperimentError> {
    csv::Reader::from_reader(reader)
        .deserialize()
        .collect::<Result<Vec<LogRow>, csv::Error>>()
        .map_err(log_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answered() -> TrialResult {
        TrialResult {
            trial_index: 1,
            load: Load::High,
            background_category: BackgroundCategory::Ai,
            background_asset: AssetId::from("ai/city.png"),
            letter_string: "AKXTRF".into(),
            target_present: true,
            response_key: Some("z".into()),
            reaction_time_ms: Some(534.25),
            correct: true,
        }
    }

    fn timed_out() -> TrialResult {
        TrialResult {
            trial_index: 2,
            load: Load::Low,
            background_category: BackgroundCategory::Solid,
            background_asset: AssetId::from("solid/grey.png"),
            letter_string: "KKKKKK".into(),
            target_present: false,
            response_key: None,
            reaction_time_ms: None,
            correct: false,
        }
    }

    #[test]
    fn header_and_rows() {
        let mut log = CsvResultLog::from_writer(Vec::new(), "p01", "1");
        log.write_result(&answered()).unwrap();
        log.write_result(&timed_out()).unwrap();
        assert_eq!(log.rows_written(), 2);

        let text = String::from_utf8(log.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "participant,session,trial_index,load,background_category,background_asset,\
             letter_string,target_present,response_key,reaction_time,correct"
        );
        assert_eq!(lines[1], "p01,1,1,high,ai,ai/city.png,AKXTRF,true,z,534.25,true");
        assert_eq!(lines[2], "p01,1,2,low,solid,solid/grey.png,KKKKKK,false,,,false");
    }

    #[test]
    fn rows_parse_back_to_results() {
        let mut log = CsvResultLog::from_writer(Vec::new(), "p01", "2");
        log.write_result(&answered()).unwrap();
        log.write_result(&timed_out()).unwrap();
        let bytes = log.into_inner().unwrap();

        let rows = read_log(bytes.as_slice()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].participant, "p01");
        assert_eq!(rows[1].session, "2");
        let results: Vec<TrialResult> = rows.into_iter().map(LogRow::into_result).collect();
        assert_eq!(results, vec![answered(), timed_out()]);
    }

    #[test]
    fn file_rows_visible_before_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.csv");
        let mut log = CsvResultLog::create(&path, "p02", "1").unwrap();
        log.write_result(&answered()).unwrap();
        log.write_result(&timed_out()).unwrap();

        let rows = read_log(File::open(&path).unwrap()).unwrap();
        assert_eq!(rows.len(), 2);
        drop(log);
    }

    #[test]
    fn vec_log_collects_results() {
        let mut log: Vec<TrialResult> = Vec::new();
        log.write_result(&answered()).unwrap();
        log.flush().unwrap();
        assert_eq!(log, vec![answered()]);
    }
}
