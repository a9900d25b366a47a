// The CSV response table.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;

use crate::survey::io_common::*;
use crate::survey::*;

/// Responses stored in a CSV file with a header row.
///
/// Every append rewrites the file through a temporary file in the same
/// directory, renamed over the original once complete.
pub struct CsvStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvStore {
    pub fn new(path: &str) -> CsvStore {
        CsvStore {
            path: PathBuf::from(path),
            write_lock: Mutex::new(()),
        }
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }

    /// Creates the file with its header row if it does not exist yet.
    pub fn ensure_exists(&self) -> SurveyResult<()> {
        if !self.path.exists() {
            info!("ensure_exists: creating {:?}", self.path);
            self.write_rows(&[])?;
        }
        Ok(())
    }

    /// Reads the data rows, already reordered into the layout of `columns()`.
    fn read_rows(&self) -> SurveyResult<Vec<RawRow>> {
        let path = self.path_str();
        if !self.path.exists() {
            debug!("read_rows: {:?} does not exist yet", path);
            return Ok(Vec::new());
        }
        let rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .context(CsvOpenSnafu { path: &path })?;
        let mut records = rdr.into_records();

        let header: Vec<String> = match records.next() {
            Some(line_r) => line_r
                .context(CsvLineParseSnafu { path: &path, lineno: 1usize })?
                .iter()
                .map(|s| s.trim_start_matches('\u{feff}').to_string())
                .collect(),
            // Empty file
            None => return Ok(Vec::new()),
        };
        debug!("read_rows: header: {:?}", header);
        if !header.iter().any(|h| h.trim() == COL_TIMESTAMP) {
            return MissingHeaderSnafu { path }.fail();
        }
        let mapping = get_col_index_mapping(&header);

        let mut res: Vec<RawRow> = Vec::new();
        for (idx, line_r) in records.enumerate() {
            let lineno = idx + 2;
            let line = line_r.context(CsvLineParseSnafu { path: &path, lineno })?;
            let cells: Vec<String> = line.iter().map(|s| s.to_string()).collect();
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            res.push(remap_row(&cells, &mapping));
        }
        Ok(res)
    }

    /// Replaces the content of the file with the header and `rows`.
    fn write_rows(&self, rows: &[RawRow]) -> SurveyResult<()> {
        let path = self.path_str();
        let dir: &Path = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).context(WritingFileSnafu { path: &path })?;
        {
            let mut wtr = csv::Writer::from_writer(&mut tmp);
            wtr.write_record(columns())
                .context(CsvWriteSnafu { path: &path })?;
            for row in rows {
                wtr.write_record(row).context(CsvWriteSnafu { path: &path })?;
            }
            wtr.flush().context(WritingFileSnafu { path: &path })?;
        }
        tmp.flush().context(WritingFileSnafu { path: &path })?;
        tmp.as_file()
            .sync_all()
            .context(WritingFileSnafu { path: &path })?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .context(WritingFileSnafu { path: &path })?;
        debug!("write_rows: {:?}: {} rows written", path, rows.len());
        Ok(())
    }

    pub fn read_responses(&self) -> SurveyResult<Vec<Response>> {
        let rows = self.read_rows()?;
        let res = rows_to_responses(&rows, 2);
        info!(
            "read_responses: {:?}: {} responses read from {} rows",
            self.path,
            res.len(),
            rows.len()
        );
        Ok(res)
    }

    fn append_row(&self, response: &Response) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut rows = self.read_rows().map_err(to_store_error)?;
        let known_ids: HashSet<&str> = rows.iter().map(respondent_id).collect();
        if known_ids.contains(response.respondent_id.trim()) {
            return Err(StoreError::DuplicateRespondent(
                response.respondent_id.clone(),
            ));
        }
        rows.push(response_to_row(response));
        self.write_rows(&rows).map_err(to_store_error)
    }
}

impl ResponseStore for CsvStore {
    fn load(&self) -> Result<Vec<Response>, StoreError> {
        self.read_responses().map_err(to_store_error)
    }

    fn append(&self, response: &Response) -> Result<(), StoreError> {
        self.append_row(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::tempdir;

    fn response(id: &str, day: u32, satisfaction: u8, recommendation: u8) -> Response {
        Response {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, day)
                .unwrap()
                .and_hms_micro_opt(14, 5, 0, 123_456)
                .unwrap(),
            respondent_id: id.to_string(),
            unit: "Juazeiro do Norte".to_string(),
            user_type: "Jurisdicionado".to_string(),
            role: String::new(),
            age_band: "41-50".to_string(),
            gender: "Feminino".to_string(),
            contact_channel: "Telefone".to_string(),
            used_virtual_desk: Some(false),
            attended_hearing: Some(true),
            dimension_scores: [Some(satisfaction); DIMENSION_COUNT],
            overall_satisfaction: Some(satisfaction),
            recommendation: Some(recommendation),
            comment: "Atendimento, rápido".to_string(),
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("respostas.csv").to_str().unwrap());
        assert_eq!(store.load(), Ok(vec![]));
    }

    #[test]
    fn appended_responses_are_loaded_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("respostas.csv");
        let store = CsvStore::new(path.to_str().unwrap());
        store.ensure_exists().unwrap();
        assert_eq!(store.load(), Ok(vec![]));

        let r1 = response("id-1", 1, 5, 10);
        let r2 = response("id-2", 2, 2, 3);
        store.append(&r1).unwrap();
        store.append(&r2).unwrap();
        assert_eq!(store.load(), Ok(vec![r1, r2]));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("timestamp,respondent_id,unidade,"));
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("respostas.csv").to_str().unwrap());
        store.append(&response("id-1", 1, 5, 10)).unwrap();
        assert_eq!(
            store.append(&response("id-1", 2, 1, 0)),
            Err(StoreError::DuplicateRespondent("id-1".to_string()))
        );
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn reordered_and_partial_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legado.csv");
        fs::write(
            &path,
            "unidade,timestamp,satisfacao_geral,recomendacao_0_10,respondent_id\n\
             Fortaleza,2024-01-10 09:00:00,5,10,a\n\
             Fortaleza,2024-01-11 09:00:00,sete,11,b\n\
             ,,,,\n\
             Fortaleza,sem data,4,9,c\n",
        )
        .unwrap();
        let store = CsvStore::new(path.to_str().unwrap());
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].overall_satisfaction, Some(5));
        assert_eq!(loaded[1].overall_satisfaction, None);
        assert_eq!(loaded[1].recommendation, None);
        assert_eq!(loaded[1].dimension_scores, [None; DIMENSION_COUNT]);

        // Appending normalizes the file to the full layout.
        store.append(&response("d", 3, 4, 8)).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("timestamp,respondent_id,unidade,"));
        assert_eq!(store.load().unwrap().len(), 3);
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("respostas.csv").to_str().unwrap());
        std::thread::scope(|s| {
            for t in 0..8 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..25 {
                        let id = format!("t{}-{}", t, i);
                        store.append(&response(&id, 1 + i % 28, 4, 9)).unwrap();
                    }
                });
            }
        });
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 200);
        let ids: HashSet<String> = loaded.into_iter().map(|r| r.respondent_id).collect();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn failed_rewrite_keeps_previous_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("respostas.csv");
        let store = CsvStore::new(path.to_str().unwrap());
        store.append(&response("id-1", 1, 5, 10)).unwrap();
        store.append(&response("id-2", 2, 3, 6)).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        // The last record is shorter than the header: the writer fails
        // after the temporary file has been started.
        let mut rows = store.read_rows().unwrap();
        rows.push(vec!["2024-03-03 10:00:00".to_string()]);
        assert!(matches!(
            store.write_rows(&rows),
            Err(SurveyError::CsvWrite { .. })
        ));

        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert_eq!(store.load().unwrap().len(), 2);
        // No temporary file is left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn file_without_header_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("respostas.csv");
        fs::write(&path, "1,2,3\n4,5,6\n").unwrap();
        let store = CsvStore::new(path.to_str().unwrap());
        assert!(matches!(store.load(), Err(StoreError::Malformed(_))));
        assert!(matches!(
            store.append(&response("x", 1, 3, 7)),
            Err(StoreError::Malformed(_))
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "1,2,3\n4,5,6\n");
    }

    #[test]
    fn submissions_through_the_store() {
        let dir = tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("respostas.csv").to_str().unwrap());
        let draft = SubmissionDraft {
            unit: "Fortaleza".to_string(),
            user_type: "Servidor/Colaborador".to_string(),
            contact_channel: "E-mail".to_string(),
            dimension_scores: [Some(4); DIMENSION_COUNT],
            overall_satisfaction: Some(4),
            recommendation: Some(9),
            ..SubmissionDraft::default()
        };
        let at = NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let first = record_submission(&store, &draft, at).unwrap();
        let second = record_submission(&store, &draft, at).unwrap();
        assert_ne!(first.respondent_id, second.respondent_id);
        assert_eq!(store.load(), Ok(vec![first, second]));
    }
}
