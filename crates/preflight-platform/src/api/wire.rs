//! Response bodies of the candidate endpoints and their mapping onto core types.

use preflight_core::{parse_timestamp, Assessment, AttemptId, RemoteError, VerificationOutcome};
use serde::{Deserialize, Serialize};

/// Ids arrive as strings or integers depending on the endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(i64),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }

    fn is(&self, id: &str) -> bool {
        match self {
            Self::Text(s) => s == id,
            Self::Number(n) => n.to_string() == id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AssessmentRecord {
    job_id: WireId,
    job_title: String,
    #[serde(default)]
    schedule_start: Option<String>,
    #[serde(default)]
    schedule_end: Option<String>,
    /// Absent means the backend did not vouch for the candidate.
    #[serde(default)]
    is_eligible: bool,
}

/// Body of `GET candidate/eligible-assessments/{user_id}`.
#[derive(Debug, Deserialize)]
struct AssessmentListing {
    #[serde(default)]
    eligible_assessments: Vec<AssessmentRecord>,
    #[serde(default)]
    all_assessments: Vec<AssessmentRecord>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StartRequest<'a> {
    pub user_id: &'a str,
    pub job_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    #[serde(default)]
    attempt_id: Option<WireId>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

const MAX_ERROR_BODY: usize = 200;

/// Best human-readable message in an error response body.
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(ErrorBody { error, message }) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(text) = error.or(message) {
            return text;
        }
    }
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

fn parse_optional_timestamp(
    field: &str,
    raw: Option<String>,
) -> Result<Option<time::OffsetDateTime>, RemoteError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_timestamp(value)
            .map(Some)
            .map_err(|e| RemoteError::InvalidResponse(format!("{} '{}': {}", field, value, e))),
    }
}

/// Find `job_id` in the candidate's listing. The assessment counts as
/// eligible only when its record says so and the backend also lists it
/// among the eligible ones (which additionally requires a complete profile).
pub(crate) fn parse_assessment(body: &str, job_id: &str) -> Result<Assessment, RemoteError> {
    let listing: AssessmentListing =
        serde_json::from_str(body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

    let listed_eligible = listing
        .eligible_assessments
        .iter()
        .any(|record| record.job_id.is(job_id));
    let record = listing
        .all_assessments
        .into_iter()
        .find(|record| record.job_id.is(job_id))
        .ok_or_else(|| RemoteError::Status {
            status: 404,
            message: format!("no assessment {} for this candidate", job_id),
        })?;

    Ok(Assessment {
        job_id: record.job_id.into_string(),
        title: record.job_title,
        schedule_start: parse_optional_timestamp("schedule_start", record.schedule_start)?,
        schedule_end: parse_optional_timestamp("schedule_end", record.schedule_end)?,
        eligible: record.is_eligible && listed_eligible,
    })
}

/// A JSON verdict is accepted whatever the status code; the service answers
/// rejections with 4xx bodies shaped like successes.
pub(crate) fn parse_verification(
    status: u16,
    body: &str,
) -> Result<VerificationOutcome, RemoteError> {
    match serde_json::from_str::<VerificationOutcome>(body) {
        Ok(outcome) => Ok(outcome),
        Err(_) if !(200..300).contains(&status) => Err(RemoteError::Status {
            status,
            message: error_message(body),
        }),
        Err(e) => Err(RemoteError::InvalidResponse(e.to_string())),
    }
}

pub(crate) fn parse_attempt(status: u16, body: &str) -> Result<AttemptId, RemoteError> {
    let response: StartResponse =
        serde_json::from_str(body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
    match response.attempt_id {
        Some(id) => Ok(AttemptId(id.into_string())),
        None => Err(RemoteError::Status {
            status,
            message: response
                .error
                .unwrap_or_else(|| "Failed to start the assessment.".to_string()),
        }),
    }
}
