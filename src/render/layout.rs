//! External layout engine (Graphviz `dot`)
//!
//! Runs `<engine> -T<format> <input.dot> -o <output>` with a timeout.
//! The engine is treated as an opaque collaborator: querymap only checks
//! that it started, finished in time and exited successfully.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{debug, info, instrument};
use wait_timeout::ChildExt;

use crate::config::{ImageFormat, Settings};
use crate::error::{QuerymapError, Result};

/// Timeout for engine availability check
const ENGINE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Layout engine invocation settings
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    /// Path to the engine binary
    program: String,
    /// Execution timeout
    timeout: Duration,
}

impl LayoutEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: crate::config::DEFAULT_LAYOUT_TIMEOUT,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.engine.clone()).with_timeout(settings.layout_timeout)
    }

    /// Set execution timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Check if the engine is installed (with 5s timeout)
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-V")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .and_then(|mut child| match child.wait_timeout(ENGINE_CHECK_TIMEOUT)? {
                Some(status) => Ok(status.success()),
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    Ok(false)
                }
            })
            .unwrap_or(false)
    }

    /// Fail with QMAP-040 unless the engine answers `-V`
    pub fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            return Ok(());
        }
        Err(QuerymapError::LayoutEngineMissing {
            engine: self.program.clone(),
            reason: "did not respond to -V".to_string(),
        })
    }

    /// Lay out `input` (a DOT file) and write the image to `output`
    #[instrument(skip(self), fields(engine = %self.program))]
    pub fn render_file(&self, input: &Path, output: &Path, format: ImageFormat) -> Result<()> {
        let mut child = Command::new(&self.program)
            .arg(format!("-T{}", format.as_str()))
            .arg(input)
            .arg("-o")
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| QuerymapError::LayoutEngineMissing {
                engine: self.program.clone(),
                reason: e.to_string(),
            })?;

        debug!(timeout = ?self.timeout, "layout engine started");

        match child.wait_timeout(self.timeout)? {
            Some(status) => {
                if status.success() {
                    info!(output = %output.display(), "image written");
                    return Ok(());
                }

                let stderr = child
                    .stderr
                    .take()
                    .map(|mut s| {
                        let mut buf = String::new();
                        s.read_to_string(&mut buf).ok();
                        buf
                    })
                    .unwrap_or_default();
                let stderr = if stderr.trim().is_empty() {
                    format!("exited with code {}", status.code().unwrap_or(-1))
                } else {
                    stderr.trim().to_string()
                };
                Err(QuerymapError::LayoutFailed {
                    engine: self.program.clone(),
                    stderr,
                })
            }
            None => {
                // Timeout! Kill the process and reap it
                let _ = child.kill();
                let _ = child.wait();
                Err(QuerymapError::LayoutTimeout {
                    engine: self.program.clone(),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}
