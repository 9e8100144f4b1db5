//! Explicit harness state for test executions
//!
//! The command layer this engine grew out of flipped ambient process
//! globals (a redaction flag, logger propagation, `os.environ`).
//! [`HarnessContext`] models the same toggles as an explicit object
//! passed through the call, so their lifetimes are visible at the call
//! site and concurrent tests stay isolated. Environment overrides are
//! still applied to the real process environment; that part is
//! process-wide by contract.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::debugger::DebuggerRegistry;
use crate::redact::SecretsMasker;

/// Tunable settings for the test-execution harness
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    /// Environment variable set to `true` while a test execution runs
    pub test_mode_variable: String,
    /// Debugger binaries probed in order for post-mortem sessions
    pub debugger_preference: Vec<String>,
    /// Whether task output is relayed to the console sink
    pub relay_output: bool,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            test_mode_variable: "TRELLIS_TEST_MODE".to_string(),
            debugger_preference: vec![
                "rust-gdb".to_string(),
                "gdb".to_string(),
                "lldb".to_string(),
            ],
            relay_output: true,
        }
    }
}

/// Receives redacted task output lines
pub trait ConsoleSink: Send + std::fmt::Debug {
    fn write_line(&mut self, line: &str);
}

/// Sink that prints to standard output
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutSink;

impl ConsoleSink for StdoutSink {
    fn write_line(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Sink that collects lines into a shared buffer.
///
/// Clones share the buffer, so a caller can keep one clone and hand the
/// other to the harness, then read back what was relayed.
#[derive(Clone, Debug, Default)]
pub struct CaptureSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the lines relayed so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

impl ConsoleSink for CaptureSink {
    fn write_line(&mut self, line: &str) {
        if let Ok(mut guard) = self.lines.lock() {
            guard.push(line.to_string());
        }
    }
}

/// Mutable process-level state threaded through a test execution
#[derive(Debug)]
pub struct HarnessContext {
    settings: HarnessSettings,
    mask_secrets: bool,
    masker: SecretsMasker,
    console_attached: bool,
    propagate_task_logs: bool,
    env_applied: Vec<String>,
    debuggers: DebuggerRegistry,
    sink: Box<dyn ConsoleSink>,
}

impl HarnessContext {
    pub fn new() -> Self {
        Self::with_settings(HarnessSettings::default())
    }

    pub fn with_settings(settings: HarnessSettings) -> Self {
        let debuggers = DebuggerRegistry::from_binaries(&settings.debugger_preference);
        Self {
            settings,
            mask_secrets: false,
            masker: SecretsMasker::new(),
            console_attached: false,
            propagate_task_logs: false,
            env_applied: Vec::new(),
            debuggers,
            sink: Box::new(StdoutSink),
        }
    }

    /// Replace the console sink
    pub fn with_sink(mut self, sink: Box<dyn ConsoleSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Declare that an aggregating console handler is already attached,
    /// so log propagation is never flipped on this context
    pub fn with_console_attached(mut self) -> Self {
        self.console_attached = true;
        self
    }

    /// Replace the debugger preference registry
    pub fn set_debuggers(&mut self, debuggers: DebuggerRegistry) {
        self.debuggers = debuggers;
    }

    pub fn debuggers(&self) -> &DebuggerRegistry {
        &self.debuggers
    }

    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    // ── Secret Masking ───────────────────────────────────────────────

    /// Turn on secret masking. One-way: there is no method to turn it
    /// back off for the lifetime of this context.
    pub fn enable_secret_masking(&mut self) {
        self.mask_secrets = true;
    }

    pub fn secret_masking_enabled(&self) -> bool {
        self.mask_secrets
    }

    /// Register a literal secret value to mask in relayed output
    pub fn add_masked_secret(&mut self, value: impl Into<String>) {
        self.masker.add_secret(value);
    }

    /// Mask `line` and relay it to the console sink, returning the
    /// masked form for the caller's own records
    pub fn relay(&mut self, line: &str) -> String {
        let masked = if self.mask_secrets {
            self.masker.mask(line)
        } else {
            line.to_string()
        };
        if self.settings.relay_output {
            self.sink.write_line(&masked);
        }
        masked
    }

    // ── Log Propagation ──────────────────────────────────────────────

    /// Enable task-log propagation unless a console handler is already
    /// attached. Returns whether the setting was flipped, for
    /// [`Self::end_log_relay`] to restore.
    pub fn begin_log_relay(&mut self) -> bool {
        if self.console_attached {
            return false;
        }
        self.propagate_task_logs = true;
        true
    }

    /// Restore the propagation setting recorded by [`Self::begin_log_relay`]
    pub fn end_log_relay(&mut self, flipped: bool) {
        if flipped {
            self.propagate_task_logs = false;
        }
    }

    pub fn task_logs_propagated(&self) -> bool {
        self.propagate_task_logs
    }

    // ── Environment ──────────────────────────────────────────────────

    /// Merge `overrides` plus the test-mode marker into the process
    /// environment. Process-wide and deliberately not undone on exit.
    pub fn apply_env(&mut self, overrides: &BTreeMap<String, String>) {
        std::env::set_var(&self.settings.test_mode_variable, "true");
        self.env_applied.push(self.settings.test_mode_variable.clone());
        for (name, value) in overrides {
            std::env::set_var(name, value);
            self.env_applied.push(name.clone());
        }
        tracing::debug!(
            count = self.env_applied.len(),
            "Applied harness environment overrides"
        );
    }

    /// Names of environment variables this context has set
    pub fn applied_env(&self) -> &[String] {
        &self.env_applied
    }
}

impl Default for HarnessContext {
    fn default() -> Self {
        Self::new()
    }
}
