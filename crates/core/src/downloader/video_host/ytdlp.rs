//! yt-dlp process driver.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use regex_lite::Regex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::engine::{EngineError, EngineEvent, EngineRequest, VideoEngine};
use crate::config::{VideoHostConfig, MAX_TIMEOUT_SECS};

/// Prefix of the lines produced by our progress template.
const PROGRESS_TAG: &str = "[opused]";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long output readers may keep draining once the process is gone.
/// Grandchildren can inherit the pipes and hold them open indefinitely.
const READER_GRACE: Duration = Duration::from_secs(2);

fn progress_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\[opused\]\s+([0-9.]+)/(\S+)").ok())
        .as_ref()
}

/// Runs the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    binary: String,
    socket_timeout_secs: u64,
    timeout_secs: u64,
}

impl YtDlpEngine {
    pub fn new(config: &VideoHostConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            socket_timeout_secs: config.socket_timeout_secs,
            timeout_secs: config.timeout_secs,
        }
    }

    fn build_args(&self, request: &EngineRequest) -> Vec<String> {
        vec![
            "-f".to_string(),
            request.format.clone(),
            "-o".to_string(),
            request.output_template.clone(),
            "--newline".to_string(),
            "--no-playlist".to_string(),
            "--no-colors".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout_secs.to_string(),
            "--progress-template".to_string(),
            format!(
                "download:{} %(progress.downloaded_bytes)s/%(progress.total_bytes,progress.total_bytes_estimate)s",
                PROGRESS_TAG
            ),
            request.target.clone(),
        ]
    }
}

impl VideoEngine for YtDlpEngine {
    fn fetch(
        &self,
        request: &EngineRequest,
        events: &UnboundedSender<EngineEvent>,
    ) -> Result<(), EngineError> {
        let args = self.build_args(request);
        debug!(binary = %self.binary, target = %request.target, "Starting yt-dlp");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::NotFound {
                        binary: self.binary.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        let last_error = Arc::new(Mutex::new(None));
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, events.clone(), last_error.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, events.clone(), last_error.clone()));
        }

        let deadline =
            Instant::now() + Duration::from_secs(self.timeout_secs.min(MAX_TIMEOUT_SECS));
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    release_readers(readers);
                    return Err(EngineError::Timeout {
                        timeout_secs: self.timeout_secs,
                    });
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };
        release_readers(readers);

        if status.success() {
            return Ok(());
        }

        let message = last_error
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .unwrap_or_else(|| "yt-dlp exited unsuccessfully".to_string());
        Err(EngineError::Failed {
            code: status.code(),
            message,
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: R,
    events: UnboundedSender<EngineEvent>,
    last_error: Arc<Mutex<Option<String>>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            let Ok(line) = line else { break };
            if let Some(event) = parse_line(&line) {
                if let EngineEvent::Error(message) = &event {
                    if let Ok(mut guard) = last_error.lock() {
                        *guard = Some(message.clone());
                    }
                }
                // Receiver may be gone; keep draining so the child never blocks.
                let _ = events.send(event);
            }
        }
    })
}

/// Join the readers, detaching any still blocked after [`READER_GRACE`].
fn release_readers(readers: Vec<thread::JoinHandle<()>>) {
    let deadline = Instant::now() + READER_GRACE;
    for reader in readers {
        while !reader.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if reader.is_finished() {
            let _ = reader.join();
        } else {
            debug!("Output pipe still held open, detaching reader");
        }
    }
}

/// Turn one line of yt-dlp output into an event.
fn parse_line(line: &str) -> Option<EngineEvent> {
    let line = line.trim();
    if let Some(message) = line.strip_prefix("ERROR:") {
        return Some(EngineEvent::Error(message.trim().to_string()));
    }
    if !line.starts_with(PROGRESS_TAG) {
        return None;
    }

    let caps = progress_regex()?.captures(line)?;
    let downloaded = parse_bytes(caps.get(1)?.as_str())?;
    let total = caps.get(2).and_then(|m| parse_bytes(m.as_str()));
    Some(EngineEvent::Progress { downloaded, total })
}

/// yt-dlp prints `NA` for unknown values and floats for estimates.
fn parse_bytes(value: &str) -> Option<u64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
}
