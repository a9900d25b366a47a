// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;

/// The eight rated aspects of the service, in the order they are asked.
///
/// The key is also the column name used by the storage formats.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Dimension {
    Clarity,
    Courtesy,
    EaseOfContact,
    ResponseTime,
    Resolution,
    Accessibility,
    ToolUsability,
    /// Only rated by respondents who attended a hearing.
    HearingExperience,
}

pub const DIMENSION_COUNT: usize = 8;

impl Dimension {
    pub const ALL: [Dimension; DIMENSION_COUNT] = [
        Dimension::Clarity,
        Dimension::Courtesy,
        Dimension::EaseOfContact,
        Dimension::ResponseTime,
        Dimension::Resolution,
        Dimension::Accessibility,
        Dimension::ToolUsability,
        Dimension::HearingExperience,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Dimension::Clarity => "clareza_informacoes",
            Dimension::Courtesy => "cordialidade_respeito",
            Dimension::EaseOfContact => "facilidade_contato",
            Dimension::ResponseTime => "tempo_resposta",
            Dimension::Resolution => "resolutividade",
            Dimension::Accessibility => "acessibilidade",
            Dimension::ToolUsability => "usabilidade_ferramentas",
            Dimension::HearingExperience => "experiencia_audiencia",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Clarity => "Clareza das informações",
            Dimension::Courtesy => "Cordialidade e respeito",
            Dimension::EaseOfContact => "Facilidade de contato",
            Dimension::ResponseTime => "Tempo de resposta/retorno",
            Dimension::Resolution => "Resolutividade",
            Dimension::Accessibility => "Acessibilidade/Inclusão",
            Dimension::ToolUsability => "Usabilidade de ferramentas/canais",
            Dimension::HearingExperience => "Experiência em audiência (se aplicável)",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// One survey submission, as recorded in the response store.
///
/// Categorical fields use the empty string for "not provided". Scores that were
/// missing or could not be read are `None`, never 0.
#[derive(PartialEq, Debug, Clone)]
pub struct Response {
    /// Wall-clock time of the submission in the configured local zone.
    pub timestamp: NaiveDateTime,
    pub respondent_id: String,
    pub unit: String,
    pub user_type: String,
    pub role: String,
    pub age_band: String,
    pub gender: String,
    pub contact_channel: String,
    pub used_virtual_desk: Option<bool>,
    pub attended_hearing: Option<bool>,
    /// Likert scores, indexed by `Dimension::index`.
    pub dimension_scores: [Option<u8>; DIMENSION_COUNT],
    pub overall_satisfaction: Option<u8>,
    pub recommendation: Option<u8>,
    pub comment: String,
}

impl Response {
    pub fn score(&self, dimension: Dimension) -> Option<u8> {
        self.dimension_scores[dimension.index()]
    }

    pub fn local_date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

// ******** Output data structures *********

/// Aggregates for one time bucket.
#[derive(PartialEq, Debug, Clone)]
pub struct PeriodAggregate {
    pub period_start: NaiveDateTime,
    pub response_count: usize,
    pub mean_satisfaction: Option<f64>,
    pub nps: Option<f64>,
}

/// Aggregates for one value of a categorical field (unit, user type).
#[derive(PartialEq, Debug, Clone)]
pub struct GroupAggregate {
    pub key: String,
    pub response_count: usize,
    pub mean_satisfaction: Option<f64>,
    pub nps: Option<f64>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct DimensionSummary {
    pub dimension: Dimension,
    pub mean: Option<f64>,
}

/// KPIs over the trailing window of the filtered responses.
#[derive(PartialEq, Debug, Clone)]
pub struct RecentWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub response_count: usize,
    pub mean_satisfaction: Option<f64>,
    pub nps: Option<f64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct TargetAlerts {
    pub satisfaction_below_target: bool,
    pub nps_below_target: bool,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CommentEntry {
    pub timestamp: NaiveDateTime,
    pub unit: String,
    pub user_type: String,
    pub comment: String,
}

/// Distinct values available for the unit and user type selectors.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct FilterOptions {
    pub units: Vec<String>,
    pub user_types: Vec<String>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct DashboardReport {
    pub criteria: FilterCriteria,
    pub granularity: Granularity,
    pub total_responses: usize,
    pub recent: RecentWindow,
    pub alerts: TargetAlerts,
    pub timeline: Vec<PeriodAggregate>,
    pub by_unit: Vec<GroupAggregate>,
    pub by_user_type: Vec<GroupAggregate>,
    pub dimensions: Vec<DimensionSummary>,
    pub comments: Vec<CommentEntry>,
}

/// Outcome of a dashboard pass.
#[derive(PartialEq, Debug, Clone)]
pub enum Dashboard {
    /// The store holds no response at all.
    NoResponses,
    /// Responses exist but none matches the selection.
    NoData,
    Report(Box<DashboardReport>),
}

// ********* Configuration **********

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ParseGranularityError(pub String);

impl Error for ParseGranularityError {}

impl Display for ParseGranularityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown granularity {:?} (expected day, week or month)",
            self.0
        )
    }
}

impl FromStr for Granularity {
    type Err = ParseGranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "d" | "daily" => Ok(Granularity::Day),
            "week" | "w" | "weekly" => Ok(Granularity::Week),
            "month" | "m" | "monthly" => Ok(Granularity::Month),
            _ => Err(ParseGranularityError(s.to_string())),
        }
    }
}

/// The selection applied before any aggregation.
///
/// `None` for the unit or the user type means "all".
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FilterCriteria {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub unit: Option<String>,
    pub user_type: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct DashboardSettings {
    /// On the 1-5 scale.
    pub satisfaction_target: f64,
    /// On the -100..100 scale.
    pub nps_target: f64,
    pub recent_window_days: i64,
    pub comment_limit: usize,
    pub timezone: Tz,
}

impl DashboardSettings {
    pub const DEFAULT: DashboardSettings = DashboardSettings {
        satisfaction_target: 4.2,
        nps_target: 50.0,
        recent_window_days: 30,
        comment_limit: 50,
        timezone: chrono_tz::America::Sao_Paulo,
    };
}

impl Default for DashboardSettings {
    fn default() -> Self {
        DashboardSettings::DEFAULT
    }
}
