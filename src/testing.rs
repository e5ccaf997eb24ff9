//! Scripted collaborators shared by the unit tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use crate::error::PrintError;
use crate::inspector::FileInspector;
use crate::job::FileAnalysis;
use crate::printer::{PrintRequest, PrinterService};
use crate::transport::{ChatTransport, OutboundEvent};

/// Printer whose attempt results are queued up front. An empty queue fails.
pub struct ScriptedPrinter {
    online: AtomicBool,
    results: Mutex<VecDeque<bool>>,
    requests: Mutex<Vec<PrintRequest>>,
    calls: AtomicU32,
    health_checks: AtomicU32,
    hang_for: Option<Duration>,
    panics: bool,
    health_panics: bool,
}

impl ScriptedPrinter {
    pub fn new(results: impl IntoIterator<Item = bool>) -> Self {
        Self {
            online: AtomicBool::new(true),
            results: Mutex::new(results.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
            health_checks: AtomicU32::new(0),
            hang_for: None,
            panics: false,
            health_panics: false,
        }
    }

    pub fn always_ok() -> Self {
        Self::new(std::iter::repeat_n(true, 64))
    }

    pub fn offline() -> Self {
        let printer = Self::always_ok();
        printer.online.store(false, Ordering::SeqCst);
        printer
    }

    pub fn hanging(duration: Duration) -> Self {
        Self {
            hang_for: Some(duration),
            ..Self::always_ok()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::always_ok()
        }
    }

    pub fn panicking_health_check() -> Self {
        Self {
            health_panics: true,
            ..Self::always_ok()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn health_checks(&self) -> u32 {
        self.health_checks.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<PrintRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl PrinterService for ScriptedPrinter {
    async fn check_online(&self) -> bool {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        if self.health_panics {
            panic!("status query crashed");
        }
        self.online.load(Ordering::SeqCst)
    }

    async fn print(&self, request: &PrintRequest) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(duration) = self.hang_for {
            tokio::time::sleep(duration).await;
        }
        if self.panics {
            panic!("printer driver crashed");
        }
        self.results.lock().unwrap().pop_front().unwrap_or(false)
    }
}

/// Inspector returning fixed facts for every file.
pub struct StubInspector(pub FileAnalysis);

impl FileInspector for StubInspector {
    async fn analyze(&self, path: &Path, _extension: &str) -> Result<FileAnalysis, PrintError> {
        if !tokio::fs::try_exists(path).await? {
            return Err(PrintError::Validation("file vanished".into()));
        }
        Ok(self.0)
    }
}

/// Transport that records everything it is asked to send.
#[derive(Default)]
pub struct RecordingTransport {
    events: Mutex<Vec<OutboundEvent>>,
}

impl RecordingTransport {
    pub fn events(&self) -> Vec<OutboundEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Texts sent to `conversation_id`, replies and edits alike.
    pub fn texts(&self, conversation_id: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OutboundEvent::Reply {
                    conversation_id: c,
                    text,
                }
                | OutboundEvent::Edit {
                    conversation_id: c,
                    text,
                } if c == conversation_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self, conversation_id: &str) -> String {
        self.texts(conversation_id).pop().unwrap_or_default()
    }
}

impl ChatTransport for RecordingTransport {
    async fn reply(&self, conversation_id: &str, text: &str) -> Result<(), PrintError> {
        self.events.lock().unwrap().push(OutboundEvent::Reply {
            conversation_id: conversation_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn edit_last_reply(&self, conversation_id: &str, text: &str) -> Result<(), PrintError> {
        self.events.lock().unwrap().push(OutboundEvent::Edit {
            conversation_id: conversation_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}
