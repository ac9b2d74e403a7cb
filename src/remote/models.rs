// ABOUTME: Data structures for backend-generator requests, job snapshots and results
// ABOUTME: These are serialized to JSON for API communication

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Opaque job identifier assigned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Generating,
    Reviewing,
    Completed,
    Failed,
    /// A status string this client does not know. Treated as still running.
    Unknown(String),
}

impl JobState {
    pub fn as_str(&self) -> &str {
        match self {
            JobState::Pending => "pending",
            JobState::Generating => "generating",
            JobState::Reviewing => "reviewing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Unknown(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl From<&str> for JobState {
    fn from(raw: &str) -> Self {
        match raw {
            "pending" => JobState::Pending,
            "generating" => JobState::Generating,
            "reviewing" => JobState::Reviewing,
            "completed" => JobState::Completed,
            "failed" => JobState::Failed,
            other => JobState::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(JobState::from(raw.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub project_name: String,
    pub framework: String,
    pub database: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub requirements: String,
}

impl GenerationRequest {
    /// Checks the two fields the service cannot work without.
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("prompt must not be empty".to_string());
        }
        if self.project_name.trim().is_empty() {
            return Err("project name must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    #[serde(alias = "job_id")]
    pub id: JobId,
}

/// Point-in-time snapshot of a generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStatus {
    pub id: JobId,
    pub status: JobState,
    #[serde(default, deserialize_with = "clamp_progress")]
    pub progress: u8,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stage: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub logs: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

fn clamp_progress<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    Ok(raw.clamp(0.0, 100.0).round() as u8)
}

/// Treats an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewFile {
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPreview {
    pub project_name: String,
    #[serde(default)]
    pub framework: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub files: Vec<PreviewFile>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadInfo {
    pub download_url: String,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_wire_shape() {
        let request = GenerationRequest {
            prompt: "task api".to_string(),
            project_name: "my-api".to_string(),
            framework: "fastapi".to_string(),
            database: "postgresql".to_string(),
            features: vec![],
            requirements: String::new(),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "prompt": "task api",
                "project_name": "my-api",
                "framework": "fastapi",
                "database": "postgresql",
                "features": [],
                "requirements": ""
            })
        );
    }

    #[test]
    fn test_request_validation() {
        let mut request = GenerationRequest {
            prompt: "task api".to_string(),
            project_name: "my-api".to_string(),
            framework: "fastapi".to_string(),
            database: "postgresql".to_string(),
            features: vec![],
            requirements: String::new(),
        };
        assert!(request.validate().is_ok());

        request.project_name = "   ".to_string();
        assert!(request.validate().is_err());

        request.project_name = "my-api".to_string();
        request.prompt = String::new();
        assert_eq!(request.validate().unwrap_err(), "prompt must not be empty");
    }

    #[test]
    fn test_status_parses_minimal_payload() {
        let status: GenerationStatus =
            serde_json::from_str(r#"{"id":"job-1","status":"pending"}"#).unwrap();
        assert_eq!(status.id.as_str(), "job-1");
        assert_eq!(status.status, JobState::Pending);
        assert_eq!(status.progress, 0);
        assert!(status.logs.is_empty());
    }

    #[test]
    fn test_unknown_status_is_not_terminal() {
        let status: GenerationStatus =
            serde_json::from_str(r#"{"id":"job-1","status":"queued","progress":5}"#).unwrap();
        assert_eq!(status.status, JobState::Unknown("queued".to_string()));
        assert!(!status.status.is_terminal());
        assert_eq!(status.status.to_string(), "queued");
    }

    #[test]
    fn test_progress_is_clamped() {
        let status: GenerationStatus =
            serde_json::from_str(r#"{"id":"j","status":"generating","progress":140.2}"#)
                .unwrap();
        assert_eq!(status.progress, 100);

        let status: GenerationStatus =
            serde_json::from_str(r#"{"id":"j","status":"generating","progress":null}"#).unwrap();
        assert_eq!(status.progress, 0);
    }

    #[test]
    fn test_status_tolerates_null_fields() {
        let status: GenerationStatus = serde_json::from_value(serde_json::json!({
            "id": "j",
            "status": "generating",
            "progress": 40,
            "stage": null,
            "logs": null,
            "error": null
        }))
        .unwrap();
        assert_eq!(status.status, JobState::Generating);
        assert_eq!(status.progress, 40);
        assert_eq!(status.stage, "");
        assert!(status.logs.is_empty());
        assert_eq!(status.error, None);
    }

    #[test]
    fn test_submit_response_accepts_job_id_alias() {
        let response: SubmitResponse = serde_json::from_str(r#"{"job_id":"abc"}"#).unwrap();
        assert_eq!(response.id, JobId::from("abc"));
    }

    #[test]
    fn test_preview_keeps_extra_fields() {
        let preview: ProjectPreview = serde_json::from_str(
            r#"{"project_name":"my-api","files":[{"path":"main.py","size":120}],"endpoints":3}"#,
        )
        .unwrap();
        assert_eq!(preview.files.len(), 1);
        assert_eq!(preview.files[0].language, None);
        assert_eq!(preview.extra.get("endpoints"), Some(&serde_json::json!(3)));
    }
}
