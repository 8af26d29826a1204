//! Building the variable map from convocation data.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::substitute::VariableMap;

/// Display text for a date or time that is not known.
pub const UNDEFINED_TEMPORAL: &str = "Non définie";

pub const DATE_FORMAT: &str = "%d/%m/%Y";
pub const TIME_FORMAT: &str = "%H:%M";

pub const TOKEN_CIVILITY: &str = "{{CIVILITE}}";
pub const TOKEN_LAST_NAME: &str = "{{NOM}}";
pub const TOKEN_FIRST_NAME: &str = "{{PRENOM}}";
pub const TOKEN_FULL_NAME: &str = "{{NOM_COMPLET}}";
pub const TOKEN_EMAIL: &str = "{{EMAIL}}";
pub const TOKEN_GROUP: &str = "{{GROUPE}}";
pub const TOKEN_ROOM: &str = "{{SALLE}}";
pub const TOKEN_JURY: &str = "{{NUMERO_JURY}}";
pub const TOKEN_DATE: &str = "{{DATE}}";
pub const TOKEN_EXAM_DATE: &str = "{{DATE_PASSAGE}}";
pub const TOKEN_SCHEDULE: &str = "{{HORAIRE}}";
pub const TOKEN_TIME: &str = "{{HEURE}}";
pub const TOKEN_CITY: &str = "{{VILLE}}";
pub const TOKEN_EXAM_TYPE: &str = "{{TYPE_EXAMEN}}";
pub const TOKEN_CERTIFICATION: &str = "{{CERTIFICATION}}";
pub const TOKEN_ADDRESS: &str = "{{ADRESSE}}";
pub const TOKEN_DURATION: &str = "{{DUREE}}";
pub const TOKEN_SUBMISSION_DATE: &str = "{{DATE_RENDU}}";
pub const TOKEN_SUBMISSION_TIME: &str = "{{HEURE_RENDU}}";
pub const TOKEN_DRIVE_LINK: &str = "{{LIEN_DRIVE}}";

/// One recipient of a convocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub civility: Option<String>,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub email: Option<String>,
    pub group: Option<String>,
    pub exam_date: Option<NaiveDate>,
    pub exam_time: Option<NaiveTime>,
    pub room: Option<String>,
    pub jury_number: Option<String>,
}

/// Data shared by every convocation of one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDetails {
    pub city: Option<String>,
    pub exam_type: Option<String>,
    pub certification: Option<String>,
    pub address: Option<String>,
    pub duration: Option<String>,
    pub submission_date: Option<NaiveDate>,
    pub submission_time: Option<NaiveTime>,
    pub drive_link: Option<String>,
}

/// A domain value before it is turned into display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(Option<String>),
    Date(Option<NaiveDate>),
    Time(Option<NaiveTime>),
}

impl FieldValue {
    pub fn text(value: &Option<String>) -> Self {
        FieldValue::Text(value.clone())
    }

    /// Display text. Missing text is blank; a missing date or time reads
    /// "Non définie".
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(value) => value.as_deref().map(collapse_whitespace).unwrap_or_default(),
            FieldValue::Date(Some(date)) => date.format(DATE_FORMAT).to_string(),
            FieldValue::Time(Some(time)) => time.format(TIME_FORMAT).to_string(),
            FieldValue::Date(None) | FieldValue::Time(None) => UNDEFINED_TEMPORAL.to_string(),
        }
    }
}

/// Trim and squeeze every whitespace run to one space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Variables for one candidate's convocation.
pub fn build_variables(candidate: &Candidate, session: &SessionDetails) -> VariableMap {
    let last_name = FieldValue::text(&candidate.last_name).render().to_uppercase();
    let first_name = FieldValue::text(&candidate.first_name).render();
    let civility = FieldValue::text(&candidate.civility).render();
    let full_name = collapse_whitespace(&format!("{} {} {}", civility, first_name, last_name));

    let exam_date = FieldValue::Date(candidate.exam_date).render();
    let exam_time = FieldValue::Time(candidate.exam_time).render();

    let mut vars = VariableMap::new();
    vars.insert(TOKEN_CIVILITY, civility);
    vars.insert(TOKEN_LAST_NAME, last_name);
    vars.insert(TOKEN_FIRST_NAME, first_name);
    vars.insert(TOKEN_FULL_NAME, full_name);
    vars.insert(TOKEN_EMAIL, FieldValue::text(&candidate.email).render());
    vars.insert(TOKEN_GROUP, FieldValue::text(&candidate.group).render());
    vars.insert(TOKEN_ROOM, FieldValue::text(&candidate.room).render());
    vars.insert(TOKEN_JURY, FieldValue::text(&candidate.jury_number).render());
    // Aliases: both names must always carry the same text.
    vars.insert(TOKEN_DATE, exam_date.clone());
    vars.insert(TOKEN_EXAM_DATE, exam_date);
    vars.insert(TOKEN_SCHEDULE, exam_time.clone());
    vars.insert(TOKEN_TIME, exam_time);

    vars.insert(TOKEN_CITY, FieldValue::text(&session.city).render());
    vars.insert(TOKEN_EXAM_TYPE, FieldValue::text(&session.exam_type).render());
    vars.insert(TOKEN_CERTIFICATION, FieldValue::text(&session.certification).render());
    vars.insert(TOKEN_ADDRESS, FieldValue::text(&session.address).render());
    vars.insert(TOKEN_DURATION, FieldValue::text(&session.duration).render());
    vars.insert(
        TOKEN_SUBMISSION_DATE,
        FieldValue::Date(session.submission_date).render(),
    );
    vars.insert(
        TOKEN_SUBMISSION_TIME,
        FieldValue::Time(session.submission_time).render(),
    );
    vars.insert(TOKEN_DRIVE_LINK, FieldValue::text(&session.drive_link).render());
    vars
}

/// Parse `dd/mm/yyyy` (or ISO `yyyy-mm-dd`). Blank input is `None`;
/// unparsable input is logged and `None`.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    let parsed = NaiveDate::parse_from_str(s, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"));
    match parsed {
        Ok(date) => Some(date),
        Err(_) => {
            log::warn!("Invalid date format: {}", s);
            None
        }
    }
}

/// Parse `HH:MM` (or `HH:MM:SS`). Same failure policy as [`parse_date`].
pub fn parse_time(input: &str) -> Option<NaiveTime> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    let parsed = NaiveTime::parse_from_str(s, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"));
    match parsed {
        Ok(time) => Some(time),
        Err(_) => {
            log::warn!("Invalid time format: {}", s);
            None
        }
    }
}
