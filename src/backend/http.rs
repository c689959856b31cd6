use anyhow::{anyhow, Context, Result};
use reqwest::{multipart, Client, Response};
use serde::Deserialize;
use url::Url;

use crate::assessment::AssessmentResult;
use crate::backend::{AssessmentBackend, ChatReply, HistoryEntry, PdfRequest, UploadReceipt};
use crate::logging::{log, obj, v_num, v_str, Domain, Level, TimedScope};
use crate::state::Config;
use crate::upload::VideoUpload;

pub struct HttpBackend {
    client: Client,
    base: Url,
    history_path: String,
}

impl HttpBackend {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            base: cfg.server_url.clone(),
            history_path: cfg.history_path.clone(),
        })
    }

    /// Base URL with `segments` appended; each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow!("server url cannot be a base: {}", self.base))?;
            path.pop_if_empty();
            for seg in segments {
                path.push(seg);
            }
        }
        Ok(url)
    }
}

#[derive(Deserialize, Debug)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    session_id: Option<String>,
    filename: Option<String>,
    #[serde(default)]
    message: String,
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ServerError {
    error: String,
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn check_status(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ServerError>(&body)
        .map(|e| e.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
    log(
        Level::Warn,
        Domain::Backend,
        "http_error",
        obj(&[
            ("call", v_str(what)),
            ("status", v_num(status.as_u16() as f64)),
            ("detail", v_str(&detail)),
        ]),
    );
    Err(anyhow!("{} failed: server returned {}: {}", what, status.as_u16(), detail))
}

#[async_trait::async_trait]
impl AssessmentBackend for HttpBackend {
    async fn upload_video(&self, video: &VideoUpload) -> Result<UploadReceipt> {
        let _t = TimedScope::new(Domain::Backend, "upload", &[("file", v_str(&video.file_name))]);
        let bytes = tokio::fs::read(&video.path)
            .await
            .with_context(|| format!("reading {}", video.path.display()))?;
        let part = multipart::Part::bytes(bytes).file_name(video.file_name.clone());
        let form = multipart::Form::new().part("video", part);

        let url = self.endpoint(&["upload"])?;
        let resp = self.client.post(url).multipart(form).send().await?;
        // The upload endpoint reports failures in the body, with or without a 4xx/5xx.
        let body: UploadResponse = resp.json().await.context("decoding upload response")?;
        match (body.success, body.session_id) {
            (true, Some(session_id)) => {
                log(
                    Level::Info,
                    Domain::Upload,
                    "uploaded",
                    obj(&[("session_id", v_str(&session_id)), ("file", v_str(&video.file_name))]),
                );
                Ok(UploadReceipt {
                    session_id,
                    filename: body.filename.unwrap_or_else(|| video.file_name.clone()),
                    message: body.message,
                })
            }
            _ => Err(anyhow!(
                "Upload failed: {}",
                body.error.unwrap_or_else(|| "no session returned".to_string())
            )),
        }
    }

    async fn fetch_history(&self) -> Result<Vec<HistoryEntry>> {
        let segments: Vec<&str> = self.history_path.split('/').filter(|s| !s.is_empty()).collect();
        let url = self.endpoint(&segments)?;
        let resp = check_status(self.client.get(url).send().await?, "history").await?;
        Ok(resp.json().await.context("decoding history")?)
    }

    async fn fetch_results(&self, session_id: &str) -> Result<AssessmentResult> {
        let url = self.endpoint(&["results", session_id])?;
        let resp = check_status(self.client.get(url).send().await?, "results").await?;
        Ok(resp.json().await.context("decoding assessment result")?)
    }

    async fn ask_chatbot(&self, query: &str, session_id: Option<&str>) -> Result<ChatReply> {
        let _t = TimedScope::new(Domain::Backend, "chatbot", &[]);
        let url = self.endpoint(&["chatbot"])?;
        let payload = serde_json::json!({ "query": query, "session_id": session_id });
        let resp = check_status(self.client.post(url).json(&payload).send().await?, "chatbot").await?;
        Ok(resp.json().await.context("decoding chatbot reply")?)
    }

    async fn generate_pdf(&self, request: &PdfRequest) -> Result<Vec<u8>> {
        let _t = TimedScope::new(
            Domain::Backend,
            "generate_pdf",
            &[("session_id", v_str(&request.session_id))],
        );
        let url = self.endpoint(&["generate-pdf"])?;
        let resp = check_status(self.client.post(url).json(request).send().await?, "generate-pdf").await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(server: &str) -> HttpBackend {
        let mut cfg = Config::default();
        cfg.server_url = Url::parse(server).unwrap();
        HttpBackend::new(&cfg).unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let b = backend("http://localhost:5000");
        assert_eq!(b.endpoint(&["upload"]).unwrap().as_str(), "http://localhost:5000/upload");

        let b = backend("https://reef.example.org/app/");
        assert_eq!(
            b.endpoint(&["results", "ab/12"]).unwrap().as_str(),
            "https://reef.example.org/app/results/ab%2F12"
        );
    }

    #[test]
    fn test_upload_response_shapes() {
        let ok: UploadResponse = serde_json::from_str(
            r#"{"success": true, "session_id": "1a2b3c4d", "filename": "dive.mp4", "message": "Upload successful. Analysis starting..."}"#,
        )
        .unwrap();
        assert!(ok.success);
        let err: UploadResponse = serde_json::from_str(r#"{"error": "No file selected"}"#).unwrap();
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("No file selected"));
    }
}
