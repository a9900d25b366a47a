// Row layout shared by the CSV and Excel stores.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::survey::*;

pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_RESPONDENT_ID: &str = "respondent_id";

/// The columns of the response table, in the order they are written.
pub fn columns() -> Vec<&'static str> {
    let mut res = vec![
        COL_TIMESTAMP,
        COL_RESPONDENT_ID,
        "unidade",
        "tipo_usuario",
        "atua_como",
        "faixa_idade",
        "genero",
        "canal_contato_mais_usado",
        "ja_usou_balcao_virtual",
        "ja_participou_audiencia",
    ];
    res.extend(Dimension::ALL.iter().map(|d| d.key()));
    res.extend(["satisfacao_geral", "recomendacao_0_10", "comentario_aberto"]);
    res
}

// Positions in `columns()`.
const IDX_ID: usize = 1;
const IDX_FIRST_DIMENSION: usize = 10;
const IDX_SATISFACTION: usize = IDX_FIRST_DIMENSION + DIMENSION_COUNT;
const IDX_RECOMMENDATION: usize = IDX_SATISFACTION + 1;
const IDX_COMMENT: usize = IDX_SATISFACTION + 2;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const YES: &str = "Sim";
const NO: &str = "Não";

/// The cells of one row, as text, in the order of `columns()`.
pub type RawRow = Vec<String>;

/// Given the header of a file, finds for every column of `columns()` the
/// position it has in the file. Columns absent from the header map to `None`.
pub fn get_col_index_mapping(header: &[String]) -> Vec<Option<usize>> {
    let positions: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim(), idx))
        .collect();
    let mapping: Vec<Option<usize>> = columns()
        .iter()
        .map(|c| positions.get(c).cloned())
        .collect();
    for (c, m) in columns().iter().zip(mapping.iter()) {
        if m.is_none() {
            warn!("get_col_index_mapping: column {:?} missing, read as empty", c);
        }
    }
    mapping
}

/// Reorders the cells of a file row into a `RawRow`.
pub fn remap_row(cells: &[String], mapping: &[Option<usize>]) -> RawRow {
    mapping
        .iter()
        .map(|m| {
            m.and_then(|idx| cells.get(idx))
                .cloned()
                .unwrap_or_default()
        })
        .collect()
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Converts an Excel serial date (days since 1899-12-30) to a timestamp.
pub fn excel_serial_to_timestamp(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

/// Reads a score between `min` and `max`. Anything else is missing.
///
/// Integral floats ("4.0") are accepted, as spreadsheets often store them.
pub fn parse_score(s: &str, min: u8, max: u8) -> Option<u8> {
    let x: f64 = s.trim().parse().ok()?;
    if !x.is_finite() || x.fract() != 0.0 || x < min as f64 || x > max as f64 {
        return None;
    }
    Some(x as u8)
}

pub fn parse_yes_no(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "sim" | "s" | "yes" | "true" | "1" => Some(true),
        "não" | "nao" | "n" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn format_yes_no(x: Option<bool>) -> String {
    match x {
        Some(true) => YES.to_string(),
        Some(false) => NO.to_string(),
        None => String::new(),
    }
}

fn format_score(x: Option<u8>) -> String {
    x.map(|v| v.to_string()).unwrap_or_default()
}

pub fn respondent_id(row: &RawRow) -> &str {
    row.get(IDX_ID).map(|s| s.trim()).unwrap_or("")
}

pub fn response_to_row(r: &Response) -> RawRow {
    let mut row: RawRow = vec![
        format_timestamp(&r.timestamp),
        r.respondent_id.clone(),
        r.unit.clone(),
        r.user_type.clone(),
        r.role.clone(),
        r.age_band.clone(),
        r.gender.clone(),
        r.contact_channel.clone(),
        format_yes_no(r.used_virtual_desk),
        format_yes_no(r.attended_hearing),
    ];
    row.extend(r.dimension_scores.iter().map(|s| format_score(*s)));
    row.push(format_score(r.overall_satisfaction));
    row.push(format_score(r.recommendation));
    row.push(r.comment.clone());
    row
}

/// Parses a row. Malformed scores become missing values; a row without a
/// readable timestamp is skipped.
pub fn row_to_response(lineno: usize, row: &RawRow) -> Option<Response> {
    let cell = |idx: usize| -> &str { row.get(idx).map(|s| s.as_str()).unwrap_or("") };
    let text = |idx: usize| -> String { cell(idx).trim().to_string() };

    let timestamp = match parse_timestamp(cell(0)) {
        Some(ts) => ts,
        None => {
            warn!(
                "row_to_response: line {}: unreadable timestamp {:?}, skipping row",
                lineno,
                cell(0)
            );
            return None;
        }
    };

    let mut dimension_scores: [Option<u8>; DIMENSION_COUNT] = [None; DIMENSION_COUNT];
    for (i, score) in dimension_scores.iter_mut().enumerate() {
        *score = parse_score(cell(IDX_FIRST_DIMENSION + i), 1, 5);
    }

    let r = Response {
        timestamp,
        respondent_id: text(IDX_ID),
        unit: text(2),
        user_type: text(3),
        role: text(4),
        age_band: text(5),
        gender: text(6),
        contact_channel: text(7),
        used_virtual_desk: parse_yes_no(cell(8)),
        attended_hearing: parse_yes_no(cell(9)),
        dimension_scores,
        overall_satisfaction: parse_score(cell(IDX_SATISFACTION), 1, 5),
        recommendation: parse_score(cell(IDX_RECOMMENDATION), 0, 10),
        comment: cell(IDX_COMMENT).to_string(),
    };
    debug!("row_to_response: line {}: {:?}", lineno, r);
    Some(r)
}

/// Parses all the rows; `first_lineno` is the line of the first data row.
pub fn rows_to_responses(rows: &[RawRow], first_lineno: usize) -> Vec<Response> {
    rows.iter()
        .enumerate()
        .filter_map(|(idx, row)| row_to_response(first_lineno + idx, row))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Response {
        Response {
            timestamp: NaiveDate::from_ymd_opt(2024, 6, 3)
                .unwrap()
                .and_hms_micro_opt(10, 15, 30, 250_000)
                .unwrap(),
            respondent_id: "6f1c".to_string(),
            unit: "Fortaleza".to_string(),
            user_type: "Advogado".to_string(),
            role: "Advogado(a) cível".to_string(),
            age_band: "31-40".to_string(),
            gender: String::new(),
            contact_channel: "PJe".to_string(),
            used_virtual_desk: Some(true),
            attended_hearing: Some(false),
            dimension_scores: [Some(4), Some(5), Some(3), Some(2), Some(4), Some(5), Some(4), None],
            overall_satisfaction: Some(4),
            recommendation: Some(8),
            comment: "Bom, mas lento, \"às vezes\".".to_string(),
        }
    }

    #[test]
    fn row_layout_matches_columns() {
        let row = response_to_row(&sample());
        assert_eq!(row.len(), columns().len());
        assert_eq!(columns()[IDX_SATISFACTION], "satisfacao_geral");
        assert_eq!(columns()[IDX_RECOMMENDATION], "recomendacao_0_10");
        assert_eq!(columns()[IDX_COMMENT], "comentario_aberto");
        assert_eq!(row[8], "Sim");
        assert_eq!(row[9], "Não");
        assert_eq!(row[IDX_FIRST_DIMENSION + 7], "");
        assert_eq!(row_to_response(2, &row), Some(sample()));
    }

    #[test]
    fn malformed_scores_are_missing() {
        assert_eq!(parse_score("4", 1, 5), Some(4));
        assert_eq!(parse_score(" 5.0 ", 1, 5), Some(5));
        assert_eq!(parse_score("4.5", 1, 5), None);
        assert_eq!(parse_score("6", 1, 5), None);
        assert_eq!(parse_score("0", 0, 10), Some(0));
        assert_eq!(parse_score("dez", 0, 10), None);
        assert_eq!(parse_score("", 0, 10), None);
        assert_eq!(parse_score("NaN", 0, 10), None);
    }

    #[test]
    fn timestamps_in_several_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-06-03 10:15:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-03T10:15:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-03 10:15"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-06-03"),
            Some(expected.date().and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("ontem"), None);
    }

    #[test]
    fn excel_serials() {
        // 45446 is 2024-06-03 in the 1900 date system.
        assert_eq!(
            excel_serial_to_timestamp(45446.5),
            Some(
                NaiveDate::from_ymd_opt(2024, 6, 3)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap()
            )
        );
        assert_eq!(excel_serial_to_timestamp(f64::NAN), None);
    }

    #[test]
    fn header_mapping_tolerates_missing_and_extra_columns() {
        let header: Vec<String> = ["recomendacao_0_10", "extra", "timestamp", "unidade"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mapping = get_col_index_mapping(&header);
        let cells: Vec<String> = ["9", "ignored", "2024-06-03 08:00:00", "Fortaleza"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let row = remap_row(&cells, &mapping);
        let r = row_to_response(2, &row).unwrap();
        assert_eq!(r.unit, "Fortaleza");
        assert_eq!(r.recommendation, Some(9));
        assert_eq!(r.overall_satisfaction, None);
        assert_eq!(r.respondent_id, "");
    }

    #[test]
    fn rows_without_timestamp_are_skipped() {
        let mut bad = response_to_row(&sample());
        bad[0] = "not a date".to_string();
        let good = response_to_row(&sample());
        assert_eq!(rows_to_responses(&[bad, good], 2).len(), 1);
    }
}
