// Reading responses from the Excel workbook of the first survey version.

use calamine::DataType;

use crate::survey::io_common::*;
use crate::survey::*;

/// Worksheet holding the responses, unless told otherwise.
pub const DEFAULT_WORKSHEET: &str = "respostas";

/// A workbook of responses. It can be loaded but not appended to.
pub struct XlsxSource {
    path: String,
    worksheet_name: Option<String>,
}

impl XlsxSource {
    pub fn new(path: &str, worksheet_name: Option<String>) -> XlsxSource {
        XlsxSource {
            path: path.to_string(),
            worksheet_name,
        }
    }

    pub fn read_responses(&self) -> SurveyResult<Vec<Response>> {
        let wrange = get_range(&self.path, self.worksheet_name.as_deref())?;
        let mut rows = wrange.rows();
        let header: Vec<String> = match rows.next() {
            Some(cells) => cells.iter().map(cell_to_string).collect(),
            None => {
                info!("read_responses: {:?}: empty worksheet", self.path);
                return Ok(Vec::new());
            }
        };
        debug!("read_responses: header: {:?}", header);
        let mapping = get_col_index_mapping(&header);

        let raw_rows: Vec<RawRow> = rows
            .map(|cells| {
                let cells: Vec<String> = cells.iter().map(cell_to_string).collect();
                remap_row(&cells, &mapping)
            })
            .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
            .collect();
        let res = rows_to_responses(&raw_rows, 2);
        info!(
            "read_responses: {:?}: {} responses read from {} rows",
            self.path,
            res.len(),
            raw_rows.len()
        );
        Ok(res)
    }
}

impl ResponseStore for XlsxSource {
    fn load(&self) -> Result<Vec<Response>, StoreError> {
        self.read_responses().map_err(to_store_error)
    }

    fn append(&self, response: &Response) -> Result<(), StoreError> {
        warn!(
            "append: {:?} is an Excel workbook, response {} not written",
            self.path, response.respondent_id
        );
        Err(StoreError::ReadOnly)
    }
}

fn get_range(
    path: &str,
    worksheet_name_o: Option<&str>,
) -> SurveyResult<calamine::Range<DataType>> {
    debug!("get_range: path: {:?} worksheet: {:?}", path, worksheet_name_o);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    if let Some(worksheet_name) = worksheet_name_o {
        return workbook
            .worksheet_range(worksheet_name)
            .context(MissingWorksheetSnafu {
                name: worksheet_name,
                path,
            })?
            .context(OpeningExcelSnafu { path });
    }

    // Without a name, the usual worksheet, or the only one.
    if let Some(wrange) = workbook.worksheet_range(DEFAULT_WORKSHEET) {
        return wrange.context(OpeningExcelSnafu { path });
    }
    let all_worksheets = workbook.worksheets();
    match all_worksheets.as_slice() {
        [] => EmptyExcelSnafu { path }.fail(),
        [(worksheet_name, wrange)] => {
            debug!("get_range: path: {:?} worksheet: {:?}", path, worksheet_name);
            Ok(wrange.clone())
        }
        _ => AmbiguousWorksheetSnafu { path }.fail(),
    }
}

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        DataType::Float(f) => f.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::DateTime(serial) => excel_serial_to_timestamp(*serial)
            .map(|ts| format_timestamp(&ts))
            .unwrap_or_default(),
        DataType::Empty => String::new(),
        other => {
            debug!("cell_to_string: unreadable cell {:?}", other);
            String::new()
        }
    }
}
