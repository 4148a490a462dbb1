//! The job application record and its input shape.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::errors::StoreError;
use crate::Result;

/// Upper bound on `jobDescription`, in characters.
pub const MAX_JOB_DESCRIPTION_CHARS: usize = 10_000;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Path segments the HTTP routes use next to `/api/records/{partition}/{id}`.
const RESERVED_IDS: &[&str] = &["import", "tags"];

/// Application status. Serialized with exactly these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    New,
    Assessment,
    Interview,
    Offer,
    Rejected,
}

impl Status {
    /// Status-adjustment rule: a scheduled interview promotes `New` and
    /// `Assessment` to `Interview`. Every other status is kept.
    pub fn adjusted_for(self, interview_date: Option<NaiveDate>) -> Status {
        match (self, interview_date) {
            (Status::New | Status::Assessment, Some(_)) => Status::Interview,
            (status, _) => status,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::New => "New",
            Status::Assessment => "Assessment",
            Status::Interview => "Interview",
            Status::Offer => "Offer",
            Status::Rejected => "Rejected",
        };
        f.write_str(name)
    }
}

/// Which of a user's two record collections an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Active,
    Archive,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Active => "active",
            Partition::Archive => "archive",
        }
    }

    /// The other partition of the same user.
    pub fn sibling(self) -> Partition {
        match self {
            Partition::Active => Partition::Archive,
            Partition::Archive => Partition::Active,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Partition {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Partition::Active),
            "archive" => Ok(Partition::Archive),
            other => Err(
                StoreError::validation("partition", format!("unknown partition '{other}'")).into(),
            ),
        }
    }
}

/// A job application as stored.
///
/// `lastUpdated` is stamped by the store on every accepted write; it is only
/// taken from the caller on bulk import, where it orders last-write-wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub job_title: String,
    pub company: String,
    pub status: Status,
    #[serde(default)]
    pub tags: Vec<String>,
    pub application_date: NaiveDate,
    #[serde(default, with = "optional_date")]
    pub interview_date: Option<NaiveDate>,
    #[serde(default)]
    pub job_description: String,
    pub last_updated: DateTime<Utc>,
}

impl Record {
    /// Checks the invariants an incoming full record must satisfy and applies
    /// the write-time normalization (tags, status adjustment). `lastUpdated`
    /// is left untouched.
    pub(crate) fn normalized(mut self) -> Result<Self> {
        check_id(&self.id)?;
        self.job_title = required_text("jobTitle", &self.job_title)?;
        self.company = required_text("company", &self.company)?;
        check_description(&self.job_description)?;
        self.tags = normalize_tags(self.tags);
        self.status = self.status.adjusted_for(self.interview_date);
        Ok(self)
    }
}

/// Record fields as supplied by a caller on create or update.
///
/// Mirrors the wire DTO: everything but the required fields has a default,
/// dates are plain strings and are parsed during validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInput {
    /// Honored on create when present (client-generated ids); ignored on update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub application_date: String,
    #[serde(default)]
    pub interview_date: String,
    #[serde(default)]
    pub job_description: String,
}

impl RecordInput {
    pub fn new(
        job_title: impl Into<String>,
        company: impl Into<String>,
        status: Status,
        application_date: impl Into<String>,
    ) -> Self {
        Self {
            job_title: job_title.into(),
            company: company.into(),
            status: Some(status),
            application_date: application_date.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_interview_date(mut self, date: impl Into<String>) -> Self {
        self.interview_date = date.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_job_description(mut self, text: impl Into<String>) -> Self {
        self.job_description = text.into();
        self
    }

    /// Validate and build the stored record. Applies tag normalization and the
    /// status-adjustment rule, and stamps `lastUpdated = now`.
    pub(crate) fn into_record(self, id: String, now: DateTime<Utc>) -> Result<Record> {
        let job_title = required_text("jobTitle", &self.job_title)?;
        let company = required_text("company", &self.company)?;
        let status = self
            .status
            .ok_or_else(|| StoreError::validation("status", "is required"))?;
        if self.application_date.trim().is_empty() {
            return Err(StoreError::validation("applicationDate", "is required").into());
        }
        let application_date = parse_date("applicationDate", &self.application_date)?;
        let interview_date = match self.interview_date.trim() {
            "" => None,
            text => Some(parse_date("interviewDate", text)?),
        };
        check_description(&self.job_description)?;

        Ok(Record {
            id,
            job_title,
            company,
            status: status.adjusted_for(interview_date),
            tags: normalize_tags(self.tags),
            application_date,
            interview_date,
            job_description: self.job_description,
            last_updated: now,
        })
    }
}

impl From<&Record> for RecordInput {
    fn from(record: &Record) -> Self {
        Self {
            id: Some(record.id.clone()),
            job_title: record.job_title.clone(),
            company: record.company.clone(),
            status: Some(record.status),
            tags: record.tags.clone(),
            application_date: record.application_date.format(DATE_FORMAT).to_string(),
            interview_date: record
                .interview_date
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
            job_description: record.job_description.clone(),
        }
    }
}

/// A record id must be usable as a single path segment and as an element of
/// a comma-separated id list.
pub(crate) fn check_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(StoreError::validation("id", "must not be empty").into());
    }
    if id.contains(['/', ',']) {
        return Err(StoreError::validation("id", format!("'{id}' contains '/' or ','")).into());
    }
    if RESERVED_IDS.contains(&id) {
        return Err(StoreError::validation("id", format!("'{id}' is reserved")).into());
    }
    Ok(())
}

fn required_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation(field, "must not be empty").into());
    }
    Ok(trimmed.to_string())
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        StoreError::validation(field, format!("'{value}' is not a YYYY-MM-DD date")).into()
    })
}

fn check_description(text: &str) -> Result<()> {
    let len = text.chars().count();
    if len > MAX_JOB_DESCRIPTION_CHARS {
        return Err(StoreError::validation(
            "jobDescription",
            format!("{len} characters exceeds the limit of {MAX_JOB_DESCRIPTION_CHARS}"),
        )
        .into());
    }
    Ok(())
}

/// Trim, drop empties and de-duplicate, keeping first occurrences in order.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// `interviewDate` is either a calendar date or `""` on the wire.
mod optional_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::DATE_FORMAT;

    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.collect_str(&d.format(DATE_FORMAT)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.is_empty() {
            return Ok(None);
        }
        NaiveDate::parse_from_str(&text, DATE_FORMAT)
            .map(Some)
            .map_err(D::Error::custom)
    }
}
