//! The analysis server as seen by the client.
//!
//! Every call is a single request/response. Failures are returned to the
//! caller to be shown to the user; nothing here retries.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::assessment::AssessmentResult;
use crate::upload::VideoUpload;

mod http;

pub use http::HttpBackend;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadReceipt {
    pub session_id: String,
    pub filename: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub session_id: String,
    pub filename: String,
    pub upload_time: String,
}

impl HistoryEntry {
    pub fn has_algal_alert(&self) -> bool {
        crate::upload::has_algal_bloom_marker(&self.filename)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfRequest {
    pub session_id: String,
    pub results: AssessmentResult,
    pub timestamp: String,
}

#[async_trait]
pub trait AssessmentBackend {
    async fn upload_video(&self, video: &VideoUpload) -> Result<UploadReceipt>;
    async fn fetch_history(&self) -> Result<Vec<HistoryEntry>>;
    async fn fetch_results(&self, session_id: &str) -> Result<AssessmentResult>;
    async fn ask_chatbot(&self, query: &str, session_id: Option<&str>) -> Result<ChatReply>;
    async fn generate_pdf(&self, request: &PdfRequest) -> Result<Vec<u8>>;
}
