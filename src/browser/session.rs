use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::autofill::error::AutofillError;
use crate::autofill::frames::{FrameId, PageContext, Tab};
use crate::dom::dom_model::{Document, DomNode, Mutation};

// ============================================================================
// Wire format
// ============================================================================

/// Request sent to the driver over stdin (one JSON line).
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DriverRequest<'a> {
    Navigate { url: &'a str },
    Snapshot,
    Apply { frame: usize, ops: &'a [Mutation] },
    Quit,
}

impl DriverRequest<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            DriverRequest::Navigate { .. } => "navigate",
            DriverRequest::Snapshot => "snapshot",
            DriverRequest::Apply { .. } => "apply",
            DriverRequest::Quit => "quit",
        }
    }
}

/// Response received from the driver over stdout (one JSON line).
#[derive(Debug, Deserialize)]
pub struct DriverResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub ready: Option<bool>,
}

/// Every frame of the current tab as the driver saw it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub frames: Vec<FrameSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub url: String,
    /// Index of the parent frame in `frames`; absent for the top document.
    #[serde(default)]
    pub parent: Option<usize>,
    pub dom: DomNode,
}

impl PageSnapshot {
    pub fn from_json(text: &str) -> Result<Self, AutofillError> {
        serde_json::from_str(text).map_err(|source| AutofillError::JsonParse {
            context: "page snapshot".into(),
            source,
        })
    }

    /// Rebuild the frame tree. Frame 0 must be the top document and every
    /// parent must precede its children.
    pub fn into_tab(self) -> Result<Tab, AutofillError> {
        let mut frames = self.frames.into_iter();
        let top = frames
            .next()
            .ok_or_else(|| AutofillError::NothingCaptured("snapshot has no frames".into()))?;
        let mut tab = Tab::new(&top.url, Document::from_snapshot(&top.dom));

        for (offset, frame) in frames.enumerate() {
            let index = offset + 1;
            let parent = match frame.parent {
                Some(p) if p < index => FrameId(p),
                other => {
                    return Err(AutofillError::DriverProtocol {
                        command: "snapshot".into(),
                        error: format!("frame {} has invalid parent {:?}", index, other),
                    });
                }
            };
            tab.add_frame(parent, &frame.url, Document::from_snapshot(&frame.dom));
        }
        Ok(tab)
    }
}

// ============================================================================
// Driver process
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub command: String,
    pub script: String,
    pub request_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            command: "node".into(),
            script: "driver/browser_server.js".into(),
            request_timeout_ms: 30_000,
        }
    }
}

/// What a live page needs from a browser.
pub trait PageDriver {
    fn snapshot(&mut self) -> Result<PageSnapshot, AutofillError>;

    /// Replay recorded mutations inside one frame.
    fn apply(&mut self, frame: FrameId, ops: &[Mutation]) -> Result<(), AutofillError>;
}

/// A persistent browser behind a driver process.
///
/// Commands go out as NDJSON on stdin. A reader thread forwards stdout lines
/// to a channel so every request has a bounded wait.
pub struct DriverSession {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
    timeout: Duration,
    closed: bool,
}

impl DriverSession {
    /// Spawn the driver and wait for its ready line.
    pub fn launch(config: &DriverConfig) -> Result<Self, AutofillError> {
        let mut child = Command::new(&config.command)
            .arg(&config.script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| AutofillError::DriverSpawn {
                command: format!("{} {}", config.command, config.script),
                source: e,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AutofillError::DriverIo("Failed to capture driver stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AutofillError::DriverIo("Failed to capture driver stdout".into()))?;

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                match line {
                    Ok(line) if line.trim().is_empty() => continue,
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        let mut session = DriverSession {
            child,
            stdin,
            lines: rx,
            timeout: Duration::from_millis(config.request_timeout_ms),
            closed: false,
        };

        let ready = session.read_response("launch")?;
        if !ready.ok || ready.ready != Some(true) {
            return Err(AutofillError::DriverProtocol {
                command: "launch".into(),
                error: "Did not receive ready signal from driver".into(),
            });
        }
        debug!(command = %config.command, script = %config.script, "driver ready");
        Ok(session)
    }

    fn read_response(&mut self, command: &str) -> Result<DriverResponse, AutofillError> {
        let line = match self.lines.recv_timeout(self.timeout) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => {
                return Err(AutofillError::DriverTimeout {
                    command: command.into(),
                    waited_ms: self.timeout.as_millis() as u64,
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(AutofillError::DriverIo(
                    "Driver closed its output (process may have died)".into(),
                ));
            }
        };

        parse_response(&line)
    }

    /// Send a request and read its response.
    fn send(&mut self, request: &DriverRequest) -> Result<DriverResponse, AutofillError> {
        let json = serde_json::to_string(request).map_err(|e| AutofillError::JsonSerialize {
            context: "DriverRequest".into(),
            source: e,
        })?;

        writeln!(self.stdin, "{}", json)
            .and_then(|_| self.stdin.flush())
            .map_err(|e| AutofillError::DriverIo(format!("Failed to write to driver: {}", e)))?;

        self.read_response(request.name())
    }

    /// Send a request and verify it succeeded.
    fn send_ok(&mut self, request: &DriverRequest) -> Result<DriverResponse, AutofillError> {
        let response = self.send(request)?;
        check_ok(response, request.name())
    }

    pub fn navigate(&mut self, url: &str) -> Result<(), AutofillError> {
        self.send_ok(&DriverRequest::Navigate { url })?;
        Ok(())
    }

    pub fn quit(&mut self) -> Result<(), AutofillError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // Best-effort: the process may already be gone
        let _ = self.send(&DriverRequest::Quit);
        let _ = self.child.wait();
        Ok(())
    }
}

impl PageDriver for DriverSession {
    fn snapshot(&mut self) -> Result<PageSnapshot, AutofillError> {
        let response = self.send_ok(&DriverRequest::Snapshot)?;
        let data = response.data.ok_or_else(|| AutofillError::DriverProtocol {
            command: "snapshot".into(),
            error: "No data in snapshot response".into(),
        })?;
        serde_json::from_value(data).map_err(|source| AutofillError::JsonParse {
            context: "driver snapshot".into(),
            source,
        })
    }

    fn apply(&mut self, frame: FrameId, ops: &[Mutation]) -> Result<(), AutofillError> {
        self.send_ok(&DriverRequest::Apply { frame: frame.0, ops })?;
        Ok(())
    }
}

impl Drop for DriverSession {
    fn drop(&mut self) {
        let _ = self.quit();
    }
}

pub fn parse_response(line: &str) -> Result<DriverResponse, AutofillError> {
    serde_json::from_str(line.trim()).map_err(|e| AutofillError::JsonParse {
        context: "driver response".into(),
        source: e,
    })
}

pub fn check_ok(response: DriverResponse, command: &str) -> Result<DriverResponse, AutofillError> {
    if !response.ok {
        return Err(AutofillError::DriverProtocol {
            command: command.into(),
            error: response.error.unwrap_or_else(|| "Unknown error".into()),
        });
    }
    Ok(response)
}

// ============================================================================
// Live page
// ============================================================================

/// A page inside a real browser. Each task sees a fresh snapshot, and the
/// mutations it records are replayed in the browser afterwards.
pub struct LivePage<D: PageDriver> {
    driver: D,
    tab: Tab,
    frame: FrameId,
}

impl<D: PageDriver> LivePage<D> {
    /// Take the first snapshot. The session runs in `frame`.
    pub fn attach(mut driver: D, frame: FrameId) -> Result<Self, AutofillError> {
        let tab = driver.snapshot()?.into_tab()?;
        if tab.frame(frame).is_none() {
            return Err(AutofillError::NothingCaptured(format!("page has no frame {}", frame.0)));
        }
        Ok(LivePage { driver, tab, frame })
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }
}

impl<D: PageDriver> PageContext for LivePage<D> {
    fn frame(&self) -> FrameId {
        self.frame
    }

    fn tab(&self) -> &Tab {
        &self.tab
    }

    fn tab_mut(&mut self) -> &mut Tab {
        &mut self.tab
    }

    fn refresh(&mut self) -> Result<(), AutofillError> {
        let tab = self.driver.snapshot()?.into_tab()?;
        if tab.frame(self.frame).is_none() {
            warn!(frame = self.frame.0, "session frame vanished from page");
        }
        self.tab = tab;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), AutofillError> {
        for (frame, ops) in self.tab.take_journals() {
            debug!(frame = frame.0, ops = ops.len(), "replaying mutations");
            self.driver.apply(frame, &ops)?;
        }
        Ok(())
    }
}
