//! Assessment records and the scheduling guard applied before a session exists.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Assessment record as supplied by the eligibility/schedule service.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub job_id: String,
    pub title: String,
    pub schedule_start: Option<OffsetDateTime>,
    pub schedule_end: Option<OffsetDateTime>,
    pub eligible: bool,
}

impl Assessment {
    pub fn reference(&self) -> AssessmentRef {
        AssessmentRef {
            job_id: self.job_id.clone(),
            title: self.title.clone(),
        }
    }
}

/// The part of an assessment a session carries around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRef {
    pub job_id: String,
    pub title: String,
}

/// Refuse session creation unless the assessment is open at `now`.
pub fn check_window(assessment: &Assessment, now: OffsetDateTime) -> Result<(), SessionError> {
    if let Some(starts_at) = assessment.schedule_start {
        if now < starts_at {
            return Err(SessionError::NotYetOpen { starts_at });
        }
    }
    if let Some(ended_at) = assessment.schedule_end {
        if now > ended_at {
            return Err(SessionError::AlreadyEnded { ended_at });
        }
    }
    if !assessment.eligible {
        return Err(SessionError::NotEligible {
            job_id: assessment.job_id.clone(),
        });
    }
    Ok(())
}

/// Parse an ISO-8601 timestamp. Timestamps without an offset are UTC.
pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(ts);
    }
    let naive = PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            raw,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(
            raw,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        )
    })?;
    Ok(naive.assume_utc())
}
