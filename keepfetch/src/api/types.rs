//! Hosting API data types and wire decoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name used when the API does not report one.
pub const UNKNOWN_FILE_NAME: &str = "unknown_file";

/// Error message the API returns for a wrong captcha answer.
pub const MSG_INVALID_CAPTCHA: &str = "Invalid captcha code";

/// Error message the API returns for deleted or missing files.
pub const MSG_FILE_NOT_FOUND: &str = "File not found";

/// File metadata reported by `getFilesInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Hosting identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Total size in bytes, when reported.
    pub size: Option<u64>,
    /// Whether the file can be downloaded at all.
    pub available: bool,
}

/// A captcha challenge issued by `requestCaptcha`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CaptchaChallenge {
    /// Opaque challenge id echoed back in the exchange.
    pub challenge: String,
    /// Location of the captcha image.
    pub captcha_url: String,
}

/// Body of a `getUrl` exchange request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeRequest {
    pub file_id: String,
    #[serde(rename = "captcha_challenge")]
    pub challenge: String,
    #[serde(rename = "captcha_response")]
    pub response: String,
}

impl ExchangeRequest {
    /// Build the exchange payload for an answered challenge.
    pub fn new(file_id: &str, challenge: &CaptchaChallenge, response: &str) -> Self {
        Self {
            file_id: file_id.to_string(),
            challenge: challenge.challenge.clone(),
            response: response.to_string(),
        }
    }
}

/// Body of a post-binding `getUrl` request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct MintRequest<'a> {
    pub file_id: &'a str,
    pub free_download_key: &'a str,
}

/// Body of a `getFilesInfo` request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct FilesInfoRequest<'a> {
    pub ids: [&'a str; 1],
}

/// Outcome of exchanging a solved captcha for a key or URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The captcha answer was rejected.
    InvalidCaptcha,
    /// The file does not exist.
    FileNotFound,
    /// Any other API-level error.
    Error(String),
    /// The server imposes a wait before the key becomes usable.
    Wait { seconds: u64, key: Option<String> },
    /// A download URL was returned immediately.
    Url(String),
    /// A download key was returned without a wait.
    Key(String),
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFilesInfo {
    status: Option<String>,
    message: Option<String>,
    #[serde(default)]
    files: Vec<RawFile>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    id: Option<String>,
    name: Option<String>,
    is_available: Option<bool>,
    size: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawUrlResponse {
    status: Option<String>,
    message: Option<String>,
    time_wait: Option<u64>,
    free_download_key: Option<String>,
    url: Option<String>,
}

impl RawFilesInfo {
    /// Convert into a descriptor for `file_id`, or the API's error message.
    pub(crate) fn into_descriptor(self, file_id: &str) -> Result<FileDescriptor, String> {
        if self.status.as_deref() != Some("success") {
            return Err(self
                .message
                .unwrap_or_else(|| format!("status {:?}", self.status)));
        }

        let file = self
            .files
            .into_iter()
            .next()
            .ok_or_else(|| "no file entries in response".to_string())?;

        let size = file.size.and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });

        Ok(FileDescriptor {
            id: file.id.unwrap_or_else(|| file_id.to_string()),
            name: file
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNKNOWN_FILE_NAME.to_string()),
            size,
            available: file.is_available != Some(false),
        })
    }
}

impl RawUrlResponse {
    /// Classify an exchange response.
    pub(crate) fn into_outcome(self) -> ExchangeOutcome {
        if self.status.as_deref() == Some("error") {
            let message = self.message.unwrap_or_default();
            return match message.as_str() {
                MSG_INVALID_CAPTCHA => ExchangeOutcome::InvalidCaptcha,
                MSG_FILE_NOT_FOUND => ExchangeOutcome::FileNotFound,
                _ => ExchangeOutcome::Error(message),
            };
        }

        if let Some(seconds) = self.time_wait {
            return ExchangeOutcome::Wait {
                seconds,
                key: self.free_download_key,
            };
        }

        match (self.url, self.free_download_key) {
            (Some(url), _) => ExchangeOutcome::Url(url),
            (None, Some(key)) => ExchangeOutcome::Key(key),
            (None, None) => ExchangeOutcome::Error("response carried neither url nor key".into()),
        }
    }

    /// Extract a minted URL, or the reason there is none.
    pub(crate) fn into_url(self) -> Result<String, String> {
        match self.url {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(self
                .message
                .unwrap_or_else(|| "response carried no url".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(json: &str) -> ExchangeOutcome {
        serde_json::from_str::<RawUrlResponse>(json)
            .unwrap()
            .into_outcome()
    }

    #[test]
    fn test_files_info_success() {
        let raw: RawFilesInfo = serde_json::from_str(
            r#"{"status":"success","files":[{"id":"abc","name":"movie.mkv","is_available":true,"size":47185920}]}"#,
        )
        .unwrap();

        let file = raw.into_descriptor("abc").unwrap();
        assert_eq!(file.name, "movie.mkv");
        assert_eq!(file.size, Some(47_185_920));
        assert!(file.available);
    }

    #[test]
    fn test_files_info_unavailable_and_string_size() {
        let raw: RawFilesInfo = serde_json::from_str(
            r#"{"status":"success","files":[{"name":"gone.zip","is_available":false,"size":"1024"}]}"#,
        )
        .unwrap();

        let file = raw.into_descriptor("xyz").unwrap();
        assert_eq!(file.id, "xyz");
        assert_eq!(file.size, Some(1024));
        assert!(!file.available);
    }

    #[test]
    fn test_files_info_missing_name() {
        let raw: RawFilesInfo =
            serde_json::from_str(r#"{"status":"success","files":[{"name":""}]}"#).unwrap();

        let file = raw.into_descriptor("abc").unwrap();
        assert_eq!(file.name, UNKNOWN_FILE_NAME);
        assert_eq!(file.size, None);
        assert!(file.available);
    }

    #[test]
    fn test_files_info_error() {
        let raw: RawFilesInfo =
            serde_json::from_str(r#"{"status":"error","message":"Bad request"}"#).unwrap();
        assert_eq!(raw.into_descriptor("abc").unwrap_err(), "Bad request");

        let raw: RawFilesInfo = serde_json::from_str(r#"{"status":"success","files":[]}"#).unwrap();
        assert!(raw.into_descriptor("abc").is_err());
    }

    #[test]
    fn test_exchange_error_messages() {
        assert_eq!(
            outcome(r#"{"status":"error","message":"Invalid captcha code"}"#),
            ExchangeOutcome::InvalidCaptcha
        );
        assert_eq!(
            outcome(r#"{"status":"error","message":"File not found"}"#),
            ExchangeOutcome::FileNotFound
        );
        assert_eq!(
            outcome(r#"{"status":"error","message":"Download limit"}"#),
            ExchangeOutcome::Error("Download limit".to_string())
        );
    }

    #[test]
    fn test_exchange_wait_and_grants() {
        assert_eq!(
            outcome(r#"{"status":"success","time_wait":30,"free_download_key":"k1"}"#),
            ExchangeOutcome::Wait {
                seconds: 30,
                key: Some("k1".to_string())
            }
        );
        assert_eq!(
            outcome(r#"{"url":"https://cdn.example/f"}"#),
            ExchangeOutcome::Url("https://cdn.example/f".to_string())
        );
        assert_eq!(
            outcome(r#"{"free_download_key":"k2"}"#),
            ExchangeOutcome::Key("k2".to_string())
        );
        assert!(matches!(outcome("{}"), ExchangeOutcome::Error(_)));
    }

    #[test]
    fn test_exchange_request_wire_names() {
        let challenge = CaptchaChallenge {
            challenge: "ch-1".to_string(),
            captcha_url: "https://k2s.cc/captcha/1".to_string(),
        };
        let body = serde_json::to_value(ExchangeRequest::new("abc", &challenge, "xyz12")).unwrap();

        assert_eq!(body["file_id"], "abc");
        assert_eq!(body["captcha_challenge"], "ch-1");
        assert_eq!(body["captcha_response"], "xyz12");
    }

    #[test]
    fn test_minted_url() {
        let raw: RawUrlResponse = serde_json::from_str(r#"{"url":"https://cdn/1"}"#).unwrap();
        assert_eq!(raw.into_url().unwrap(), "https://cdn/1");

        let raw: RawUrlResponse =
            serde_json::from_str(r#"{"status":"error","message":"Key expired"}"#).unwrap();
        assert_eq!(raw.into_url().unwrap_err(), "Key expired");
    }
}
