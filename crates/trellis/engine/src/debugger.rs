//! Post-mortem debugger resolution
//!
//! Debuggers are probed through an ordered preference list; the first one
//! that is actually usable on this host wins. Exhausting the list is a
//! constructed [`EngineError::DebuggerUnavailable`], never a panic.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use crate::error::{EngineError, EngineResult};

/// A debugger implementation that can take over after a task failure
pub trait DebuggerHook: Send + Sync {
    /// Name used in resolution errors and logs
    fn name(&self) -> &str;

    /// Whether this debugger can be launched on this host
    fn is_available(&self) -> bool;

    /// Drop into the debugger's breakpoint entry point
    fn enter(&self) -> EngineResult<()>;
}

/// A debugger backed by an external binary resolved through `PATH`
pub struct ExternalDebugger {
    name: String,
    binary: String,
}

impl ExternalDebugger {
    pub fn new(name: impl Into<String>, binary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binary: binary.into(),
        }
    }
}

impl DebuggerHook for ExternalDebugger {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        find_in_path(&self.binary).is_some()
    }

    fn enter(&self) -> EngineResult<()> {
        let path = find_in_path(&self.binary).ok_or_else(|| {
            EngineError::DebuggerUnavailable(format!(
                "debugger '{}' is no longer on PATH",
                self.name
            ))
        })?;
        tracing::info!(
            debugger = %self.name,
            path = %path.display(),
            "Launching post-mortem debugger"
        );
        // Attach to the current process and block until the session ends.
        let status = Command::new(&path)
            .arg("-p")
            .arg(std::process::id().to_string())
            .status()
            .map_err(|error| {
                EngineError::DebuggerUnavailable(format!(
                    "failed to launch '{}': {error}",
                    self.name
                ))
            })?;
        if !status.success() {
            tracing::warn!(
                debugger = %self.name,
                code = ?status.code(),
                "Debugger exited with a failure status"
            );
        }
        Ok(())
    }
}

impl fmt::Debug for ExternalDebugger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalDebugger")
            .field("name", &self.name)
            .field("binary", &self.binary)
            .finish()
    }
}

impl fmt::Debug for dyn DebuggerHook + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebuggerHook")
            .field("name", &self.name())
            .finish()
    }
}

/// Ordered registry of debugger hooks, probed front to back
#[derive(Default)]
pub struct DebuggerRegistry {
    hooks: Vec<Box<dyn DebuggerHook>>,
}

impl DebuggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry of [`ExternalDebugger`] hooks from binary names
    pub fn from_binaries(binaries: &[String]) -> Self {
        let mut registry = Self::new();
        for binary in binaries {
            registry.register(Box::new(ExternalDebugger::new(binary.clone(), binary.clone())));
        }
        registry
    }

    /// Append a hook to the end of the preference order
    pub fn register(&mut self, hook: Box<dyn DebuggerHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Names in preference order
    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|hook| hook.name()).collect()
    }

    /// Return the first available hook.
    ///
    /// An empty registry or a registry with no usable hook is an error the
    /// caller must surface; a requested post-mortem session that cannot
    /// start should never be silently skipped.
    pub fn resolve(&self) -> EngineResult<&dyn DebuggerHook> {
        if self.hooks.is_empty() {
            return Err(EngineError::DebuggerUnavailable(
                "no debugger hooks are registered".to_string(),
            ));
        }
        self.hooks
            .iter()
            .find(|hook| hook.is_available())
            .map(|hook| hook.as_ref())
            .ok_or_else(|| {
                EngineError::DebuggerUnavailable(format!(
                    "none of [{}] are available on this host",
                    self.names().join(", ")
                ))
            })
    }
}

impl fmt::Debug for DebuggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebuggerRegistry")
            .field("hooks", &self.names())
            .finish()
    }
}

fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}
