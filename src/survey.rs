pub mod config_reader;
mod io_common;
pub mod io_csv;
pub mod io_xlsx;

use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};

use std::collections::HashSet;
use std::fs;

use calamine::{open_workbook, Reader, Xlsx};

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use survey_metrics::*;

use crate::args::{Args, Command};
use crate::survey::config_reader::*;
use crate::survey::io_csv::CsvStore;
use crate::survey::io_xlsx::XlsxSource;

#[derive(Debug, Snafu)]
pub enum SurveyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The workbook {path} has no worksheet"))]
    EmptyExcel { path: String },
    #[snafu(display("Worksheet {name} not found in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display(
        "The workbook {path} has several worksheets, the worksheet name must be provided"
    ))]
    AmbiguousWorksheet { path: String },
    #[snafu(display("Error reading file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing CSV file {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The first row of {path} is not a response header"))]
    MissingHeader { path: String },
    #[snafu(display("Invalid value for {field}: {message}"))]
    InvalidConfig { field: String, message: String },
    #[snafu(display("Invalid date {value:?}, expected YYYY-MM-DD"))]
    InvalidDate {
        source: chrono::ParseError,
        value: String,
    },
    #[snafu(display("Invalid granularity: {source}"))]
    InvalidGranularity { source: ParseGranularityError },
    #[snafu(display("Error accessing the responses: {source}"))]
    Store { source: StoreError },
    #[snafu(display("The submission was rejected: {source}"))]
    Submission { source: SubmissionError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SurveyResult<T> = Result<T, SurveyError>;

/// Reports a failure of the file layer through the store interface.
fn to_store_error(e: SurveyError) -> StoreError {
    match e {
        SurveyError::MissingHeader { .. } | SurveyError::CsvLineParse { .. } => {
            StoreError::Malformed(e.to_string())
        }
        _ => StoreError::Unavailable(e.to_string()),
    }
}

// ********* Settings ***********

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InputType {
    Csv,
    Xlsx,
}

pub const DEFAULT_DATA_FILE: &str = "respostas.csv";

/// Everything a command needs, once the configuration file and the flags
/// have been merged.
#[derive(PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub data_file: String,
    pub input_type: InputType,
    pub excel_worksheet_name: Option<String>,
    pub dashboard: DashboardSettings,
}

fn parse_input_type(s: &str) -> SurveyResult<InputType> {
    match s.to_lowercase().as_str() {
        "csv" => Ok(InputType::Csv),
        "xlsx" | "excel" => Ok(InputType::Xlsx),
        x => InvalidConfigSnafu {
            field: "inputType",
            message: format!("{:?} is not one of csv, xlsx", x),
        }
        .fail(),
    }
}

pub fn resolve_settings(args: &Args, config: &SurveyConfig) -> SurveyResult<RunSettings> {
    let data_file = args
        .data
        .clone()
        .or_else(|| config.data_file.clone())
        .unwrap_or_else(|| DEFAULT_DATA_FILE.to_string());
    let input_type = match args.input_type.as_ref().or(config.input_type.as_ref()) {
        Some(s) => parse_input_type(s)?,
        None if data_file.to_lowercase().ends_with(".xlsx") => InputType::Xlsx,
        None => InputType::Csv,
    };
    Ok(RunSettings {
        data_file,
        input_type,
        excel_worksheet_name: args
            .excel_worksheet_name
            .clone()
            .or_else(|| config.excel_worksheet_name.clone()),
        dashboard: config.dashboard_settings()?,
    })
}

fn open_store(settings: &RunSettings) -> Box<dyn ResponseStore> {
    match settings.input_type {
        InputType::Csv => Box::new(CsvStore::new(&settings.data_file)),
        InputType::Xlsx => Box::new(XlsxSource::new(
            &settings.data_file,
            settings.excel_worksheet_name.clone(),
        )),
    }
}

/// The current wall-clock time in the survey timezone.
fn local_now(tz: Tz) -> chrono::NaiveDateTime {
    Utc::now().with_timezone(&tz).naive_local()
}

fn parse_date(s: &str) -> SurveyResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").context(InvalidDateSnafu { value: s })
}

// ********* Report output ***********

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn groups_to_json(groups: &[GroupAggregate]) -> Vec<JSValue> {
    groups
        .iter()
        .map(|g| {
            json!({
                "key": g.key,
                "responses": g.response_count,
                "meanSatisfaction": g.mean_satisfaction,
                "nps": g.nps,
            })
        })
        .collect()
}

fn dashboard_to_json(dashboard: &Dashboard, options: &FilterOptions) -> JSValue {
    let options_js = json!({
        "units": options.units,
        "userTypes": options.user_types,
    });
    let report = match dashboard {
        Dashboard::NoResponses => {
            return json!({ "status": "noResponses", "options": options_js });
        }
        Dashboard::NoData => {
            return json!({ "status": "noData", "options": options_js });
        }
        Dashboard::Report(report) => report,
    };

    let timeline: Vec<JSValue> = report
        .timeline
        .iter()
        .map(|p| {
            json!({
                "periodStart": p.period_start.format(DATE_FORMAT).to_string(),
                "responses": p.response_count,
                "meanSatisfaction": p.mean_satisfaction,
                "nps": p.nps,
            })
        })
        .collect();
    let dimensions: Vec<JSValue> = report
        .dimensions
        .iter()
        .map(|d| {
            json!({
                "dimension": d.dimension.key(),
                "label": d.dimension.label(),
                "mean": d.mean,
            })
        })
        .collect();
    let comments: Vec<JSValue> = report
        .comments
        .iter()
        .map(|c| {
            json!({
                "timestamp": c.timestamp.format(DATETIME_FORMAT).to_string(),
                "unit": c.unit,
                "userType": c.user_type,
                "comment": c.comment,
            })
        })
        .collect();

    json!({
        "status": "report",
        "options": options_js,
        "selection": {
            "startDate": report.criteria.start_date.format(DATE_FORMAT).to_string(),
            "endDate": report.criteria.end_date.format(DATE_FORMAT).to_string(),
            "unit": report.criteria.unit,
            "userType": report.criteria.user_type,
            "granularity": report.granularity.as_str(),
        },
        "totalResponses": report.total_responses,
        "recent": {
            "start": report.recent.start.format(DATETIME_FORMAT).to_string(),
            "end": report.recent.end.format(DATETIME_FORMAT).to_string(),
            "responses": report.recent.response_count,
            "meanSatisfaction": report.recent.mean_satisfaction,
            "nps": report.recent.nps,
        },
        "alerts": {
            "satisfactionBelowTarget": report.alerts.satisfaction_below_target,
            "npsBelowTarget": report.alerts.nps_below_target,
        },
        "timeline": timeline,
        "byUnit": groups_to_json(&report.by_unit),
        "byUserType": groups_to_json(&report.by_user_type),
        "dimensions": dimensions,
        "comments": comments,
    })
}

// ********* Commands ***********

pub struct ReportRequest<'a> {
    pub start: Option<&'a str>,
    pub end: Option<&'a str>,
    pub unit: Option<&'a str>,
    pub user_type: Option<&'a str>,
    pub granularity: Option<&'a str>,
}

/// Loads the responses and computes the dashboard for the request.
pub fn compute_report(
    store: &dyn ResponseStore,
    request: &ReportRequest,
    settings: &DashboardSettings,
) -> SurveyResult<JSValue> {
    let responses = store.load().context(StoreSnafu {})?;
    let granularity: Granularity = match request.granularity {
        Some(s) => s
            .parse::<Granularity>()
            .context(InvalidGranularitySnafu {})?,
        None => Granularity::Day,
    };

    // Without explicit dates, the selection spans all the responses.
    let today = local_now(settings.timezone).date();
    let default_span = FilterCriteria::spanning(&responses);
    let start_date = match request.start {
        Some(s) => parse_date(s)?,
        None => default_span.as_ref().map(|c| c.start_date).unwrap_or(today),
    };
    let end_date = match request.end {
        Some(s) => parse_date(s)?,
        None => default_span.as_ref().map(|c| c.end_date).unwrap_or(today),
    };
    let criteria = FilterCriteria {
        start_date,
        end_date,
        unit: request.unit.map(|s| s.to_string()),
        user_type: request.user_type.map(|s| s.to_string()),
    };

    let dashboard = build_dashboard(&responses, &criteria, granularity, settings);
    Ok(dashboard_to_json(&dashboard, &filter_options(&responses)))
}

fn write_output(pretty_js: &str, out: Option<&str>) -> SurveyResult<()> {
    match out {
        None | Some("stdout") => {
            println!("{}", pretty_js);
            Ok(())
        }
        Some(path) => {
            info!("Writing the report to {:?}", path);
            fs::write(path, pretty_js).context(WritingFileSnafu { path })
        }
    }
}

fn check_reference(pretty_js: &str, reference_path: &str) -> SurveyResult<()> {
    let summary_ref = read_summary(reference_path)?;
    let pretty_js_ref = serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    if pretty_js_ref != pretty_js {
        warn!("Found differences with the reference report");
        print_diff(pretty_js_ref.as_str(), pretty_js, "\n");
        whatever!("Difference detected between the computed report and the reference report")
    }
    info!("The report matches the reference {:?}", reference_path);
    Ok(())
}

/// Records one submission; returns the response as stored.
pub fn submit(
    store: &dyn ResponseStore,
    draft: &SubmissionDraft,
    tz: Tz,
) -> SurveyResult<Response> {
    let submitted_at = local_now(tz);
    record_submission(store, draft, submitted_at).context(SubmissionSnafu {})
}

/// Copies the responses of `source` into `target`, skipping the respondents
/// `target` already has. Returns the number of responses copied.
pub fn import_responses(
    source: &dyn ResponseStore,
    target: &dyn ResponseStore,
) -> SurveyResult<usize> {
    let incoming = source.load().context(StoreSnafu {})?;
    let mut known: HashSet<String> = target
        .load()
        .context(StoreSnafu {})?
        .into_iter()
        .map(|r| r.respondent_id)
        .collect();
    let mut imported = 0;
    for r in incoming.iter() {
        if r.respondent_id.is_empty() || known.contains(&r.respondent_id) {
            warn!(
                "import_responses: skipping response {:?} of {}",
                r.respondent_id, r.timestamp
            );
            continue;
        }
        target.append(r).context(StoreSnafu {})?;
        known.insert(r.respondent_id.clone());
        imported += 1;
    }
    info!(
        "import_responses: {} of {} responses imported",
        imported,
        incoming.len()
    );
    Ok(imported)
}

pub fn run(args: &Args) -> SurveyResult<()> {
    let config = match &args.config {
        Some(path) => read_config(path)?,
        None => SurveyConfig::default(),
    };
    let settings = resolve_settings(args, &config)?;
    info!("settings: {:?}", settings);

    match &args.command {
        Command::Submit { draft } => {
            ensure_whatever!(
                settings.input_type == InputType::Csv,
                "Submissions can only be recorded in a CSV data file"
            );
            let draft = read_draft(draft)?;
            let store = CsvStore::new(&settings.data_file);
            store.ensure_exists()?;
            let response = submit(&store, &draft, settings.dashboard.timezone)?;
            println!("{}", response.respondent_id);
        }
        Command::Report {
            start,
            end,
            unit,
            user_type,
            granularity,
            out,
            reference,
        } => {
            let store = open_store(&settings);
            let request = ReportRequest {
                start: start.as_deref(),
                end: end.as_deref(),
                unit: unit.as_deref(),
                user_type: user_type.as_deref(),
                granularity: granularity.as_deref(),
            };
            let result_js = compute_report(store.as_ref(), &request, &settings.dashboard)?;
            let pretty_js = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
            debug!("report: {}", pretty_js);
            write_output(&pretty_js, out.as_deref())?;
            if let Some(reference_path) = reference {
                check_reference(&pretty_js, reference_path)?;
            }
        }
        Command::Import { input, worksheet } => {
            ensure_whatever!(
                settings.input_type == InputType::Csv,
                "Responses can only be imported into a CSV data file"
            );
            let source = XlsxSource::new(
                input,
                worksheet.clone().or_else(|| settings.excel_worksheet_name.clone()),
            );
            let target = CsvStore::new(&settings.data_file);
            target.ensure_exists()?;
            let imported = import_responses(&source, &target)?;
            println!("{}", imported);
        }
    }
    Ok(())
}
