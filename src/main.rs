use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio::time::Duration;

use reefassess::backend::{AssessmentBackend, HttpBackend};
use reefassess::chat::{route_chat, ChatOutcome};
use reefassess::console::{ConsoleLine, LineKind};
use reefassess::feed::start_channel_listener;
use reefassess::logging::{log, log_error, obj, v_str, Domain, Level};
use reefassess::report::{pdf_filename, Report};
use reefassess::simulator::{run_location_assessment, LocationRegistry};
use reefassess::state::{Config, EventOutcome, SessionState};
use reefassess::upload::prepare_upload;

const USAGE: &str = "usage: reefassess <command>

commands:
  upload <video>             upload a dive video and follow its analysis
  watch <session>            follow the analysis of an uploaded session
  history                    list past uploads
  results <session>          print the report for a past session
  locations                  list the known assessment sites
  simulate <location>        run a simulated assessment for a known site
  chat <session|-> <text..>  ask about a session, or request a what-if regeneration
  pdf <session>              download the server-rendered PDF report";

const ALGAL_BLOOM_ALERT: &str = "Algal bloom alert: file name marks this dive as an algal bloom survey.";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let cfg = Config::from_env()?;
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("command", v_str(command)),
            ("server", v_str(cfg.server_url.as_str())),
        ]),
    );
    let backend = HttpBackend::new(&cfg)?;
    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut state = SessionState::new();

    let outcome = match (command, &args[1..]) {
        ("upload", [video]) => upload(&cfg, &backend, &mut state, Path::new(video)).await,
        ("watch", [session]) => {
            state.begin_upload(session);
            print_new_lines(&state, 0);
            follow_analysis(&cfg, &mut state).await
        }
        ("history", []) => history(&backend, &mut state).await,
        ("results", [session]) => {
            load(&backend, &mut state, session).await?;
            print_report(&state);
            Ok(())
        }
        ("locations", []) => {
            for site in LocationRegistry::gulf_of_california().iter() {
                println!("{:<22} {:>9.4} {:>10.4}  {}", site.name, site.lat, site.lng, site.description);
            }
            Ok(())
        }
        ("simulate", [location]) => simulate(&cfg, &mut state, location, &mut rng).await,
        ("chat", [session, words @ ..]) if !words.is_empty() => {
            if session != "-" {
                load(&backend, &mut state, session).await?;
            }
            let text = words.join(" ");
            let outcome = route_chat(&mut state, &text, &backend, &mut rng).await;
            if let Some(reply) = outcome.reply() {
                println!("{}", reply);
            }
            if let ChatOutcome::Regenerated { .. } = outcome {
                print_report(&state);
            }
            Ok(())
        }
        ("pdf", [session]) => {
            load(&backend, &mut state, session).await?;
            download_pdf(&cfg, &backend, &mut state).await.map(|_| ())
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    if let Err(err) = &outcome {
        log_error(Domain::System, "command_failed", err);
    }
    outcome
}

fn print_line(state: &mut SessionState, line: ConsoleLine) {
    println!("{}", state.console.push(line).render());
}

fn print_new_lines(state: &SessionState, already: usize) {
    for line in &state.console.lines()[already..] {
        println!("{}", line.render());
    }
}

fn print_report(state: &SessionState) {
    if let Some(result) = &state.current {
        println!("{}", Report::from_result(result).to_text());
    }
}

async fn upload<B: AssessmentBackend>(
    cfg: &Config,
    backend: &B,
    state: &mut SessionState,
    video: &Path,
) -> Result<()> {
    let upload = prepare_upload(video)?;
    if upload.algal_bloom_alert {
        println!("{}", ALGAL_BLOOM_ALERT);
    }
    let receipt = backend.upload_video(&upload).await?;
    println!("Upload complete! Starting analysis... (session {})", receipt.session_id);
    let seen = state.console.len();
    state.begin_upload(&receipt.session_id);
    print_new_lines(state, seen);
    follow_analysis(cfg, state).await
}

/// Stream channel events for the active session until its analysis completes.
async fn follow_analysis(cfg: &Config, state: &mut SessionState) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(64);
    let ws_url = cfg.ws_url.to_string();
    let listener = tokio::spawn(async move { start_channel_listener(ws_url, tx).await });

    while let Some(event) = rx.recv().await {
        let seen = state.console.len();
        let outcome = state.apply_channel_event(event);
        print_new_lines(state, seen);
        if outcome == EventOutcome::Completed {
            print_report(state);
            listener.abort();
            return Ok(());
        }
    }

    print_line(
        state,
        ConsoleLine::now(
            LineKind::Error,
            "Connection to assessment system lost. Please try again.",
        ),
    );
    match listener.await {
        Ok(Err(err)) => Err(err),
        _ => bail!("real-time channel closed before the analysis completed"),
    }
}

async fn history<B: AssessmentBackend>(backend: &B, state: &mut SessionState) -> Result<()> {
    state.history = backend.fetch_history().await?;
    if state.history.is_empty() {
        println!("No previous uploads found.");
    }
    for item in &state.history {
        let badge = if item.has_algal_alert() { "  [Algal Alert]" } else { "" };
        println!("{}  {}  {}{}", item.session_id, item.upload_time, item.filename, badge);
    }
    Ok(())
}

async fn load<B: AssessmentBackend>(backend: &B, state: &mut SessionState, session: &str) -> Result<()> {
    let result = backend
        .fetch_results(session)
        .await
        .with_context(|| format!("Error loading session {}", session))?;
    state.load_session(session, result);
    if state.algal_bloom_alert() {
        println!("{}", ALGAL_BLOOM_ALERT);
    }
    Ok(())
}

async fn simulate(
    cfg: &Config,
    state: &mut SessionState,
    location: &str,
    rng: &mut StdRng,
) -> Result<()> {
    let registry = LocationRegistry::gulf_of_california();
    if registry.get(location).is_none() {
        let known: Vec<&str> = registry.iter().map(|l| l.name.as_str()).collect();
        bail!("unknown location '{}'; known sites: {}", location, known.join(", "));
    }

    state.begin_simulation();
    print_new_lines(state, 0);

    let (tx, mut rx) = mpsc::channel::<ConsoleLine>(16);
    let result = {
        let tick = Duration::from_millis(cfg.step_ms);
        let sequence = run_location_assessment(location, &registry, tick, &tx, rng);
        tokio::pin!(sequence);

        // Print lines while the sequencer ticks.
        loop {
            tokio::select! {
                done = &mut sequence => break done,
                Some(line) = rx.recv() => print_line(state, line),
            }
        }
    };
    drop(tx);
    while let Some(line) = rx.recv().await {
        print_line(state, line);
    }

    if let Some(result) = result {
        state.adopt_simulation(result);
        print_report(state);
        println!(
            "I've generated a simulated assessment for {}. You can now ask questions about this location's marine ecosystem health.",
            location
        );
    }
    Ok(())
}

async fn download_pdf<B: AssessmentBackend>(
    cfg: &Config,
    backend: &B,
    state: &mut SessionState,
) -> Result<PathBuf> {
    let request = state.pdf_request()?;
    let bytes = backend.generate_pdf(&request).await.map_err(|err| {
        print_line(
            state,
            ConsoleLine::now(LineKind::Error, format!("Error generating PDF report: {}", err)),
        );
        err
    })?;
    let name = pdf_filename(&request.results.location, Utc::now().date_naive());
    let path = Path::new(&cfg.download_dir).join(&name);
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    print_line(
        state,
        ConsoleLine::now(
            LineKind::Success,
            format!("PDF report generated and downloaded as \"{}\"", name),
        ),
    );
    log(
        Level::Info,
        Domain::Report,
        "pdf_saved",
        obj(&[("session_id", v_str(&request.session_id)), ("path", v_str(&path.display().to_string()))]),
    );
    Ok(path)
}
