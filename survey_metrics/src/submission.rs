use std::error::Error;
use std::fmt::Display;

use chrono::NaiveDateTime;
use log::{debug, info};
use uuid::Uuid;

pub use crate::config::*;
use crate::store::{ResponseStore, StoreError};

/// Unit choice asking the respondent to type the unit name.
pub const UNIT_OTHER: &str = "Outra (informar)";

/// Recorded when the respondent picked `UNIT_OTHER` but typed nothing.
pub const UNIT_OTHER_FALLBACK: &str = "Outra";

pub const USER_TYPES: [&str; 4] = [
    "Jurisdicionado",
    USER_TYPE_LAWYER,
    "Servidor/Colaborador",
    "Outro",
];

/// The only user type asked about the role it acts in.
pub const USER_TYPE_LAWYER: &str = "Advogado";

pub const LAWYER_ROLES: [&str; 5] = [
    "Advogado(a) cível",
    "Advogado(a) tributário",
    "Advogado(a) previdenciário",
    "Advogado(a) trabalhista",
    "Outro",
];

pub const CONTACT_CHANNELS: [&str; 7] = [
    "Balcão Virtual",
    "E-mail",
    "Telefone",
    "Presencial",
    "PJe",
    "WhatsApp (institucional)",
    "Outro",
];

pub const AGE_BANDS: [&str; 5] = ["18-30", "31-40", "41-50", "51-60", "61+"];

pub const GENDERS: [&str; 4] = ["F", "M", "Outro", "Prefiro não informar"];

pub const MAX_COMMENT_CHARS: usize = 500;

/// Everything the survey form collected, before validation.
///
/// The form hands over a complete draft; nothing else is shared with it.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SubmissionDraft {
    pub unit: String,
    /// Free text typed when `unit` is `UNIT_OTHER`.
    pub custom_unit: String,
    pub user_type: String,
    pub role: String,
    pub age_band: String,
    pub gender: String,
    pub contact_channel: String,
    pub used_virtual_desk: bool,
    pub attended_hearing: bool,
    /// Indexed by `Dimension::index`. The hearing score is ignored unless
    /// `attended_hearing` is set.
    pub dimension_scores: [Option<u8>; DIMENSION_COUNT],
    pub overall_satisfaction: Option<u8>,
    pub recommendation: Option<u8>,
    pub comment: String,
}

/// Reasons a draft is not recorded.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SubmissionError {
    MissingUnit,
    InvalidChoice { field: &'static str, value: String },
    MissingScore { field: &'static str },
    ScoreOutOfRange { field: &'static str, value: u8 },
    CommentTooLong { chars: usize },
    Store(StoreError),
}

impl Error for SubmissionError {}

impl Display for SubmissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionError::MissingUnit => write!(f, "the unit is required"),
            SubmissionError::InvalidChoice { field, value } => {
                write!(f, "{:?} is not a valid choice for {}", value, field)
            }
            SubmissionError::MissingScore { field } => write!(f, "{} must be answered", field),
            SubmissionError::ScoreOutOfRange { field, value } => {
                write!(f, "{} is out of range for {}", value, field)
            }
            SubmissionError::CommentTooLong { chars } => write!(
                f,
                "the comment has {} characters (at most {} allowed)",
                chars, MAX_COMMENT_CHARS
            ),
            SubmissionError::Store(e) => write!(f, "the response was not recorded: {}", e),
        }
    }
}

impl From<StoreError> for SubmissionError {
    fn from(e: StoreError) -> Self {
        SubmissionError::Store(e)
    }
}

/// Checks a draft and turns it into a response with the given id and time.
pub fn validate_draft(
    draft: &SubmissionDraft,
    respondent_id: String,
    submitted_at: NaiveDateTime,
) -> Result<Response, SubmissionError> {
    let unit = resolve_unit(draft)?;
    let user_type = required_choice("tipo_usuario", &draft.user_type, &USER_TYPES)?;
    let contact_channel = required_choice(
        "canal_contato_mais_usado",
        &draft.contact_channel,
        &CONTACT_CHANNELS,
    )?;
    let age_band = optional_choice("faixa_idade", &draft.age_band, &AGE_BANDS)?;
    let gender = optional_choice("genero", &draft.gender, &GENDERS)?;
    let role = if user_type == USER_TYPE_LAWYER {
        optional_choice("atua_como", &draft.role, &LAWYER_ROLES)?
    } else {
        String::new()
    };

    let mut dimension_scores: [Option<u8>; DIMENSION_COUNT] = [None; DIMENSION_COUNT];
    for dimension in Dimension::ALL {
        let raw = draft.dimension_scores[dimension.index()];
        dimension_scores[dimension.index()] = match dimension {
            Dimension::HearingExperience if !draft.attended_hearing => None,
            _ => Some(likert(dimension.key(), raw)?),
        };
    }
    let overall_satisfaction = likert("satisfacao_geral", draft.overall_satisfaction)?;

    let recommendation = match draft.recommendation {
        None => {
            return Err(SubmissionError::MissingScore {
                field: "recomendacao_0_10",
            })
        }
        Some(x) if x > 10 => {
            return Err(SubmissionError::ScoreOutOfRange {
                field: "recomendacao_0_10",
                value: x,
            })
        }
        Some(x) => x,
    };

    let comment = draft.comment.trim().to_string();
    let chars = comment.chars().count();
    if chars > MAX_COMMENT_CHARS {
        return Err(SubmissionError::CommentTooLong { chars });
    }

    Ok(Response {
        timestamp: submitted_at,
        respondent_id,
        unit,
        user_type,
        role,
        age_band,
        gender,
        contact_channel,
        used_virtual_desk: Some(draft.used_virtual_desk),
        attended_hearing: Some(draft.attended_hearing),
        dimension_scores,
        overall_satisfaction: Some(overall_satisfaction),
        recommendation: Some(recommendation),
        comment,
    })
}

/// Validates the draft, gives it a fresh respondent id and appends it.
///
/// On any error nothing has been recorded.
pub fn record_submission(
    store: &dyn ResponseStore,
    draft: &SubmissionDraft,
    submitted_at: NaiveDateTime,
) -> Result<Response, SubmissionError> {
    let response = validate_draft(draft, Uuid::new_v4().to_string(), submitted_at)?;
    debug!("record_submission: validated: {:?}", response);
    store.append(&response)?;
    info!(
        "Recorded response {} ({} / {})",
        response.respondent_id, response.unit, response.user_type
    );
    Ok(response)
}

fn resolve_unit(draft: &SubmissionDraft) -> Result<String, SubmissionError> {
    let unit = draft.unit.trim();
    if unit.is_empty() {
        return Err(SubmissionError::MissingUnit);
    }
    if unit == UNIT_OTHER {
        let custom = draft.custom_unit.trim();
        if custom.is_empty() {
            Ok(UNIT_OTHER_FALLBACK.to_string())
        } else {
            Ok(custom.to_string())
        }
    } else {
        Ok(unit.to_string())
    }
}

fn required_choice(
    field: &'static str,
    value: &str,
    allowed: &[&str],
) -> Result<String, SubmissionError> {
    let v = value.trim();
    if allowed.contains(&v) {
        Ok(v.to_string())
    } else {
        Err(SubmissionError::InvalidChoice {
            field,
            value: value.to_string(),
        })
    }
}

fn optional_choice(
    field: &'static str,
    value: &str,
    allowed: &[&str],
) -> Result<String, SubmissionError> {
    if value.trim().is_empty() {
        Ok(String::new())
    } else {
        required_choice(field, value, allowed)
    }
}

fn likert(field: &'static str, value: Option<u8>) -> Result<u8, SubmissionError> {
    match value {
        None => Err(SubmissionError::MissingScore { field }),
        Some(x) if !(1..=5).contains(&x) => {
            Err(SubmissionError::ScoreOutOfRange { field, value: x })
        }
        Some(x) => Ok(x),
    }
}
