use std::collections::BTreeMap;
use std::io::Read;

use crate::survey::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

// ********* Configuration file ***********

/// Longest accepted recent window, about a century.
pub const MAX_RECENT_WINDOW_DAYS: i64 = 36_500;

/// The optional configuration file. Command line flags take precedence.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(rename = "dataFile")]
    pub data_file: Option<String>,
    #[serde(rename = "inputType")]
    pub input_type: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "satisfactionTarget")]
    pub satisfaction_target: Option<f64>,
    #[serde(rename = "npsTarget")]
    pub nps_target: Option<f64>,
    pub timezone: Option<String>,
    #[serde(rename = "recentWindowDays")]
    pub recent_window_days: Option<i64>,
    #[serde(rename = "commentLimit")]
    pub comment_limit: Option<usize>,
}

impl SurveyConfig {
    /// The dashboard settings, starting from the defaults.
    pub fn dashboard_settings(&self) -> SurveyResult<DashboardSettings> {
        let mut res = DashboardSettings::default();
        if let Some(x) = self.satisfaction_target {
            res.satisfaction_target = x;
        }
        if let Some(x) = self.nps_target {
            res.nps_target = x;
        }
        if let Some(x) = self.recent_window_days {
            ensure!(
                (0..=MAX_RECENT_WINDOW_DAYS).contains(&x),
                InvalidConfigSnafu {
                    field: "recentWindowDays",
                    message: format!("{} is not between 0 and {}", x, MAX_RECENT_WINDOW_DAYS)
                }
            );
            res.recent_window_days = x;
        }
        if let Some(x) = self.comment_limit {
            res.comment_limit = x;
        }
        if let Some(tz_name) = &self.timezone {
            res.timezone = tz_name.parse::<Tz>().map_err(|e| {
                InvalidConfigSnafu {
                    field: "timezone",
                    message: format!("{}", e),
                }
                .build()
            })?;
        }
        Ok(res)
    }
}

pub fn read_config(path: &str) -> SurveyResult<SurveyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: SurveyConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

// ********* Submission drafts ***********

/// A survey answer as handed over by the form, in JSON.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftFile {
    pub unit: String,
    #[serde(rename = "customUnit", default)]
    pub custom_unit: String,
    #[serde(rename = "userType")]
    pub user_type: String,
    #[serde(default)]
    pub role: String,
    #[serde(rename = "ageBand", default)]
    pub age_band: String,
    #[serde(default)]
    pub gender: String,
    #[serde(rename = "contactChannel")]
    pub contact_channel: String,
    #[serde(rename = "usedVirtualDesk", default)]
    pub used_virtual_desk: bool,
    #[serde(rename = "attendedHearing", default)]
    pub attended_hearing: bool,
    /// Dimension column name (`clareza_informacoes`, ...) to score.
    #[serde(default)]
    pub scores: BTreeMap<String, u8>,
    #[serde(rename = "overallSatisfaction")]
    pub overall_satisfaction: Option<u8>,
    pub recommendation: Option<u8>,
    #[serde(default)]
    pub comment: String,
}

impl DraftFile {
    pub fn to_draft(&self) -> SurveyResult<SubmissionDraft> {
        let mut dimension_scores: [Option<u8>; DIMENSION_COUNT] = [None; DIMENSION_COUNT];
        for (key, score) in self.scores.iter() {
            let dimension = match Dimension::ALL.iter().find(|d| d.key() == key.as_str()) {
                Some(d) => d,
                None => whatever!("Unknown dimension {:?} in the scores of the draft", key),
            };
            dimension_scores[dimension.index()] = Some(*score);
        }
        Ok(SubmissionDraft {
            unit: self.unit.clone(),
            custom_unit: self.custom_unit.clone(),
            user_type: self.user_type.clone(),
            role: self.role.clone(),
            age_band: self.age_band.clone(),
            gender: self.gender.clone(),
            contact_channel: self.contact_channel.clone(),
            used_virtual_desk: self.used_virtual_desk,
            attended_hearing: self.attended_hearing,
            dimension_scores,
            overall_satisfaction: self.overall_satisfaction,
            recommendation: self.recommendation,
            comment: self.comment.clone(),
        })
    }
}

/// Reads a draft from a file, or from the standard input for `-`.
pub fn read_draft(path: &str) -> SurveyResult<SubmissionDraft> {
    let contents = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context(OpeningJsonSnafu { path })?;
        buf
    } else {
        fs::read_to_string(path).context(OpeningJsonSnafu { path })?
    };
    let draft_file: DraftFile = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("read_draft: {:?}", draft_file);
    draft_file.to_draft()
}

/// Reads a reference report.
pub fn read_summary(path: &str) -> SurveyResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_summary: {:?}", js);
    Ok(js)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_gives_defaults() {
        let config: SurveyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SurveyConfig::default());
        assert_eq!(
            config.dashboard_settings().unwrap(),
            DashboardSettings::default()
        );
    }

    #[test]
    fn config_overrides() {
        let config: SurveyConfig = serde_json::from_str(
            r#"{"dataFile": "dados/respostas.csv", "npsTarget": 40, "timezone": "America/Fortaleza", "commentLimit": 10}"#,
        )
        .unwrap();
        assert_eq!(config.data_file, Some("dados/respostas.csv".to_string()));
        let settings = config.dashboard_settings().unwrap();
        assert_eq!(settings.nps_target, 40.0);
        assert_eq!(settings.satisfaction_target, 4.2);
        assert_eq!(settings.comment_limit, 10);
        assert_eq!(settings.timezone, chrono_tz::America::Fortaleza);
    }

    #[test]
    fn bad_config_values() {
        let config = SurveyConfig {
            timezone: Some("Mars/Olympus".to_string()),
            ..SurveyConfig::default()
        };
        assert!(config.dashboard_settings().is_err());
        let config = SurveyConfig {
            recent_window_days: Some(-1),
            ..SurveyConfig::default()
        };
        assert!(config.dashboard_settings().is_err());
        let config = SurveyConfig {
            recent_window_days: Some(1_000_000_000),
            ..SurveyConfig::default()
        };
        assert!(matches!(
            config.dashboard_settings(),
            Err(SurveyError::InvalidConfig { .. })
        ));
        let config = SurveyConfig {
            recent_window_days: Some(MAX_RECENT_WINDOW_DAYS),
            ..SurveyConfig::default()
        };
        assert_eq!(
            config.dashboard_settings().unwrap().recent_window_days,
            MAX_RECENT_WINDOW_DAYS
        );
    }

    #[test]
    fn draft_from_json() {
        let draft_file: DraftFile = serde_json::from_str(
            r#"{
                "unit": "Fortaleza",
                "userType": "Jurisdicionado",
                "contactChannel": "Telefone",
                "attendedHearing": true,
                "scores": {"clareza_informacoes": 5, "experiencia_audiencia": 3},
                "overallSatisfaction": 4,
                "recommendation": 9
            }"#,
        )
        .unwrap();
        let draft = draft_file.to_draft().unwrap();
        assert_eq!(draft.dimension_scores[Dimension::Clarity.index()], Some(5));
        assert_eq!(
            draft.dimension_scores[Dimension::HearingExperience.index()],
            Some(3)
        );
        assert_eq!(draft.dimension_scores[Dimension::Courtesy.index()], None);
        assert!(draft.attended_hearing);
        assert!(!draft.used_virtual_desk);
        assert_eq!(draft.comment, "");
    }

    #[test]
    fn unknown_dimension_in_draft() {
        let draft_file = DraftFile {
            scores: [("pontualidade".to_string(), 3u8)].into_iter().collect(),
            ..DraftFile::default()
        };
        assert!(draft_file.to_draft().is_err());
    }
}
