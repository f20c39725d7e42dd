use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/lectures/download`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LectureDownloadPayload {
    pub course_id: String,
    pub panopto_url: String,
    pub stream_url: String,
    pub title: Option<String>,
}

/// Response from the lecture endpoints. Both fields may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LectureResponse {
    #[serde(default)]
    pub lecture_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// FastAPI style error body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    pub fn detail_message(&self) -> Option<String> {
        match &self.detail {
            None | Some(Value::Null) => None,
            Some(Value::String(detail)) if detail.is_empty() => None,
            Some(Value::String(detail)) => Some(detail.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Outcome of probing `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Reachable,
    ErrorStatus(u16),
    Unreachable(String),
}

impl HealthStatus {
    pub fn is_reachable(&self) -> bool {
        matches!(self, HealthStatus::Reachable)
    }

    pub fn message(&self) -> &'static str {
        match self {
            HealthStatus::Reachable => "Backend is reachable!",
            HealthStatus::ErrorStatus(_) => "Backend returned an error.",
            HealthStatus::Unreachable(_) => "Backend could not be reached.",
        }
    }
}

/// A course as returned by the backend; ids may be numbers or strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCourse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub course_id: Option<Value>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub course_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CoursesPayload {
    List(Vec<RawCourse>),
    Wrapped {
        #[serde(default)]
        courses: Vec<RawCourse>,
    },
}

impl CoursesPayload {
    pub fn into_courses(self) -> Vec<RawCourse> {
        match self {
            CoursesPayload::List(courses) => courses,
            CoursesPayload::Wrapped { courses } => courses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseOption {
    pub id: String,
    pub label: String,
}

impl RawCourse {
    /// `None` when the course carries no usable identifier.
    pub fn normalize(self) -> Option<CourseOption> {
        let code = self
            .code
            .clone()
            .or_else(|| self.course_code.clone())
            .unwrap_or_default();
        let name = self.name.or(self.course_name).unwrap_or_default();

        // The first field present picks the id; an empty or zero value drops the course.
        let id = self
            .id
            .or(self.course_id)
            .or_else(|| self.code.map(Value::String))
            .or_else(|| self.course_code.map(Value::String))
            .and_then(|value| id_string(&value))?;

        let label = match (code.is_empty(), name.is_empty()) {
            (false, false) => format!("{} - {}", code, name),
            (_, false) => name,
            (false, true) => code,
            (true, true) => "Untitled course".to_string(),
        };

        Some(CourseOption { id, label })
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) if id.as_f64() != Some(0.0) => Some(id.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}
