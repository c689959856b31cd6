use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use url::Url;

use crate::assessment::{regenerate, AssessmentResult, ResultOverrides};
use crate::backend::{HistoryEntry, PdfRequest};
use crate::console::{ConsoleLine, ConsoleLog, LineKind};
use crate::feed::ChannelEvent;
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::upload::has_algal_bloom_marker;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_url: Url,
    pub ws_url: Url,
    pub history_path: String,
    pub download_dir: String,
    /// Sequencer tick for simulated assessments.
    pub step_ms: u64,
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        let server_url = Url::parse("http://localhost:5000").expect("static url");
        let ws_url = derive_ws_url(&server_url).expect("static url");
        Self {
            server_url,
            ws_url,
            history_path: "/get-history".to_string(),
            download_dir: ".".to_string(),
            step_ms: 1000,
            seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let server_url = match std::env::var("REEF_SERVER") {
            Ok(raw) => Url::parse(&raw).with_context(|| format!("REEF_SERVER is not a url: {}", raw))?,
            Err(_) => defaults.server_url,
        };
        let ws_url = match std::env::var("REEF_WS") {
            Ok(raw) => Url::parse(&raw).with_context(|| format!("REEF_WS is not a url: {}", raw))?,
            Err(_) => derive_ws_url(&server_url)?,
        };
        Ok(Self {
            server_url,
            ws_url,
            history_path: std::env::var("REEF_HISTORY_PATH").unwrap_or(defaults.history_path),
            download_dir: std::env::var("REEF_DOWNLOAD_DIR").unwrap_or(defaults.download_dir),
            step_ms: std::env::var("REEF_STEP_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(defaults.step_ms),
            seed: std::env::var("REEF_SEED").ok().and_then(|v| v.parse().ok()),
        })
    }
}

/// Engine.IO query for a websocket-only Socket.IO session.
pub const SOCKET_IO_QUERY: &str = "EIO=4&transport=websocket";

/// `http(s)://host/...` -> `ws(s)://host/socket.io/?EIO=4&transport=websocket`
pub fn derive_ws_url(server: &Url) -> Result<Url> {
    let mut ws = server.clone();
    let scheme = match server.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => bail!("unsupported server scheme: {}", other),
    };
    ws.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot switch {} to {}", server, scheme))?;
    ws.set_path("/socket.io/");
    ws.set_query(Some(SOCKET_IO_QUERY));
    ws.set_fragment(None);
    Ok(ws)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Event for another session, or a connection notice.
    Ignored,
    Logged,
    Completed,
}

/// Everything the client knows about the session it is showing.
///
/// Owned by the caller and mutated only through these methods; responses
/// are applied in arrival order, so the last one wins.
#[derive(Debug, Default)]
pub struct SessionState {
    pub active_session_id: Option<String>,
    pub current: Option<AssessmentResult>,
    pub history: Vec<HistoryEntry>,
    pub console: ConsoleLog,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh upload was accepted; wait for its events.
    pub fn begin_upload(&mut self, session_id: &str) {
        self.active_session_id = Some(session_id.to_string());
        self.current = None;
        self.console.push(ConsoleLine::now(
            LineKind::System,
            "Initializing Gulf of California Marine Assessment System...",
        ));
    }

    pub fn apply_channel_event(&mut self, event: ChannelEvent) -> EventOutcome {
        let matches = match (event.session_id(), self.active_session_id.as_deref()) {
            (Some(ev), Some(active)) => ev == active,
            _ => false,
        };
        if !matches {
            if let Some(other) = event.session_id() {
                log(
                    Level::Debug,
                    Domain::Feed,
                    "session_mismatch",
                    obj(&[("session_id", v_str(other))]),
                );
            }
            return EventOutcome::Ignored;
        }

        match event {
            ChannelEvent::Connected { .. } => EventOutcome::Ignored,
            ChannelEvent::AnalysisStep { message, timestamp, .. } => {
                let line = match timestamp {
                    Some(ts) => ConsoleLine::new(ts, LineKind::Info, message),
                    None => ConsoleLine::now(LineKind::Info, message),
                };
                self.console.push(line);
                EventOutcome::Logged
            }
            ChannelEvent::AnalysisComplete { results, .. } => {
                self.console.push(ConsoleLine::now(
                    LineKind::Success,
                    "Analysis complete! Generating report...",
                ));
                log(
                    Level::Info,
                    Domain::Report,
                    "analysis_complete",
                    obj(&[
                        ("session_id", v_str(&results.session_id)),
                        ("fhi", v_num(results.fish_health_index)),
                    ]),
                );
                self.current = Some(results);
                EventOutcome::Completed
            }
        }
    }

    /// Show a past session fetched from the history.
    pub fn load_session(&mut self, session_id: &str, result: AssessmentResult) {
        self.active_session_id = Some(session_id.to_string());
        self.current = Some(result);
        self.console.push(ConsoleLine::now(
            LineKind::System,
            "Analysis session loaded from history",
        ));
    }

    /// Start a location simulation with a fresh console.
    pub fn begin_simulation(&mut self) {
        self.console.clear();
    }

    /// True when the result on screen comes from a video marked as an algal bloom dive.
    pub fn algal_bloom_alert(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|r| has_algal_bloom_marker(&r.video_filename))
    }

    pub fn adopt_simulation(&mut self, result: AssessmentResult) {
        self.active_session_id = Some(result.session_id.clone());
        self.current = Some(result);
    }

    /// Replace the current result with a regenerated one.
    pub fn regenerate(&mut self, overrides: &ResultOverrides) -> Option<&AssessmentResult> {
        let next = regenerate(self.current.as_ref()?, overrides);
        self.console.push(ConsoleLine::now(
            LineKind::System,
            "Regenerating technical report with updated parameters...",
        ));
        self.current = Some(next);
        self.current.as_ref()
    }

    /// Offer a simulated run when the user picks a site other than the one on screen.
    pub fn should_offer_simulation(&self, location: &str) -> bool {
        self.current.as_ref().is_some_and(|r| r.location != location)
    }

    pub fn pdf_request(&self) -> Result<PdfRequest> {
        match (&self.active_session_id, &self.current) {
            (Some(session_id), Some(results)) => Ok(PdfRequest {
                session_id: session_id.clone(),
                results: results.clone(),
                timestamp: Utc::now().to_rfc3339(),
            }),
            _ => bail!("Please complete an analysis before downloading a PDF report."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::sample_result;
    use crate::console::CLEARED_MESSAGE;

    fn step(session: &str, msg: &str) -> ChannelEvent {
        ChannelEvent::AnalysisStep {
            session_id: session.to_string(),
            message: msg.to_string(),
            timestamp: Some("10:00:00".to_string()),
        }
    }

    #[test]
    fn test_ws_url_derivation() {
        let u = derive_ws_url(&Url::parse("https://reef.example.org/app").unwrap()).unwrap();
        assert_eq!(
            u.as_str(),
            "wss://reef.example.org/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            Config::default().ws_url.as_str(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_foreign_session_events_ignored() {
        let mut s = SessionState::new();
        s.begin_upload("mine");
        let before = s.console.len();
        assert_eq!(s.apply_channel_event(step("theirs", "x")), EventOutcome::Ignored);
        assert_eq!(
            s.apply_channel_event(ChannelEvent::AnalysisComplete {
                session_id: "theirs".to_string(),
                results: sample_result(),
                message: String::new(),
            }),
            EventOutcome::Ignored
        );
        assert_eq!(s.console.len(), before);
        assert!(s.current.is_none());
    }

    #[test]
    fn test_events_without_active_session_ignored() {
        let mut s = SessionState::new();
        assert_eq!(s.apply_channel_event(step("any", "x")), EventOutcome::Ignored);
    }

    #[test]
    fn test_step_then_complete() {
        let mut s = SessionState::new();
        s.begin_upload("mine");
        assert_eq!(s.apply_channel_event(step("mine", "Extracting frames")), EventOutcome::Logged);
        assert_eq!(s.console.lines().last().unwrap().timestamp, "10:00:00");
        let outcome = s.apply_channel_event(ChannelEvent::AnalysisComplete {
            session_id: "mine".to_string(),
            results: sample_result(),
            message: String::new(),
        });
        assert_eq!(outcome, EventOutcome::Completed);
        assert_eq!(s.current.as_ref().unwrap().location, "La Paz");
    }

    #[test]
    fn test_regenerate_supersedes_current() {
        let mut s = SessionState::new();
        assert!(s.regenerate(&ResultOverrides::default()).is_none());

        s.load_session("abc12345", sample_result());
        let r = s
            .regenerate(&ResultOverrides { fish_density: Some(250), ..Default::default() })
            .unwrap();
        assert_eq!(r.fish_density, 250);
        assert!(r.is_regenerated);
        assert_eq!(s.current.as_ref().unwrap().fish_density, 250);
    }

    #[test]
    fn test_offer_simulation_only_for_other_sites() {
        let mut s = SessionState::new();
        assert!(!s.should_offer_simulation("Loreto"));
        s.adopt_simulation(sample_result());
        assert!(s.should_offer_simulation("Loreto"));
        assert!(!s.should_offer_simulation("La Paz"));
        assert_eq!(s.active_session_id.as_deref(), Some("abc12345"));
    }

    #[test]
    fn test_begin_upload_announces_itself() {
        let mut s = SessionState::new();
        s.begin_upload("watched");
        assert_eq!(s.console.len(), 1);
        assert_eq!(s.console.lines()[0].kind, LineKind::System);
        assert!(s.console.lines()[0].message.starts_with("Initializing"));
    }

    #[test]
    fn test_simulation_starts_with_cleared_console() {
        let mut s = SessionState::new();
        s.begin_upload("old");
        s.apply_channel_event(step("old", "Extracting frames"));
        assert_eq!(s.console.len(), 2);

        s.begin_simulation();
        assert_eq!(s.console.len(), 1);
        assert_eq!(s.console.lines()[0].message, CLEARED_MESSAGE);
    }

    #[test]
    fn test_algal_bloom_alert_follows_loaded_video() {
        let mut s = SessionState::new();
        assert!(!s.algal_bloom_alert());
        s.load_session("abc12345", sample_result());
        assert!(!s.algal_bloom_alert());

        let mut bloom = sample_result();
        bloom.video_filename = "Loreto_Algal_Bloom_survey.mp4".to_string();
        s.load_session("abc12345", bloom);
        assert!(s.algal_bloom_alert());
    }

    #[test]
    fn test_pdf_request_requires_analysis() {
        let mut s = SessionState::new();
        assert!(s.pdf_request().is_err());
        s.load_session("abc12345", sample_result());
        let req = s.pdf_request().unwrap();
        assert_eq!(req.session_id, "abc12345");
    }
}
