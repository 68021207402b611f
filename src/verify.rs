//! External type-check verification.
//!
//! Runs a checker command (for example `npx tsc --noEmit`), captures its
//! output through a bounded buffer, and scans it for an error signature such
//! as `error TS2339`. The checker is opaque: a spawn failure, a crash with no
//! output, or output truncated before the signature appears all make the
//! result [`Verification::Inconclusive`], never an error of the run itself.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;

/// Default cap on captured bytes per output stream.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

/// Text produced by a checker run.
#[derive(Debug, Clone, Default)]
pub struct CheckOutput {
    /// Captured stdout followed by captured stderr.
    pub text: String,
    /// Whether either stream exceeded the capture limit.
    pub truncated: bool,
    /// Whether the process exited successfully.
    pub success: bool,
}

/// Something that can run a type check and hand back its output.
pub trait TypeCheck {
    fn describe(&self) -> String;
    fn run(&self) -> Result<CheckOutput>;
}

/// Outcome of scanning checker output for a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Verification {
    /// The signature is still present.
    Present { occurrences: usize },
    /// The signature no longer appears.
    Absent,
    Inconclusive { reason: String },
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verification::Present { occurrences } => {
                write!(f, "signature present ({} occurrence(s))", occurrences)
            }
            Verification::Absent => f.write_str("signature not found"),
            Verification::Inconclusive { reason } => write!(f, "unknown ({})", reason),
        }
    }
}

/// Runs `check` and scans its output for `signature`.
pub fn verify(check: &dyn TypeCheck, signature: &str) -> Verification {
    match check.run() {
        Ok(output) => scan(&output, signature),
        Err(err) => Verification::Inconclusive {
            reason: format!("{:#}", err),
        },
    }
}

/// Classifies checker output.
pub fn scan(output: &CheckOutput, signature: &str) -> Verification {
    if signature.is_empty() {
        return Verification::Inconclusive {
            reason: "empty signature".to_string(),
        };
    }
    let occurrences = output.text.matches(signature).count();
    if occurrences > 0 {
        return Verification::Present { occurrences };
    }
    if output.truncated {
        return Verification::Inconclusive {
            reason: "output truncated before the signature was seen".to_string(),
        };
    }
    if !output.success && output.text.trim().is_empty() {
        return Verification::Inconclusive {
            reason: "checker failed without output".to_string(),
        };
    }
    Verification::Absent
}

/// A checker run as an external process.
#[derive(Debug, Clone)]
pub struct CommandCheck {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    max_output_bytes: usize,
}

impl CommandCheck {
    /// Builds a check from an argv-style command. Fails on an empty command.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .context("verification command is empty")?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            cwd: None,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        })
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn max_output_bytes(mut self, limit: usize) -> Self {
        self.max_output_bytes = limit;
        self
    }
}

impl TypeCheck for CommandCheck {
    fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn run(&self) -> Result<CheckOutput> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to run {}", self.describe()))?;

        let captured = capture(&mut child, self.max_output_bytes);
        let ((out_bytes, out_truncated), (err_bytes, err_truncated), status) =
            reap(&mut child, captured)
                .with_context(|| format!("Failed to run {}", self.describe()))?;

        let mut text = String::from_utf8_lossy(&out_bytes).into_owned();
        text.push_str(&String::from_utf8_lossy(&err_bytes));
        Ok(CheckOutput {
            text,
            truncated: out_truncated || err_truncated,
            success: status.success(),
        })
    }
}

type Captured = ((Vec<u8>, bool), (Vec<u8>, bool));

/// Reads the child's stdout and stderr, each up to `limit` bytes.
fn capture(child: &mut Child, limit: usize) -> Result<Captured> {
    let stdout = child.stdout.take().context("stdout not captured")?;
    let stderr = child.stderr.take().context("stderr not captured")?;
    // Both pipes are drained concurrently so a chatty stream cannot block
    // the child while the other one is being read.
    let err_reader = thread::spawn(move || read_bounded(stderr, limit));
    let out = read_bounded(stdout, limit);
    let err = err_reader
        .join()
        .map_err(|_| anyhow::anyhow!("stderr reader panicked"))?;
    Ok((out?, err?))
}

/// Waits for the child whether or not capturing succeeded. A child whose
/// output could not be read is killed first.
fn reap(
    child: &mut Child,
    captured: Result<Captured>,
) -> Result<((Vec<u8>, bool), (Vec<u8>, bool), ExitStatus)> {
    if captured.is_err() {
        let _ = child.kill();
    }
    let status = child.wait().context("Failed to wait for checker")?;
    let (out, err) = captured?;
    Ok((out, err, status))
}

/// Reads up to `limit` bytes and discards the rest of the stream.
fn read_bounded<R: Read>(mut reader: R, limit: usize) -> io::Result<(Vec<u8>, bool)> {
    let mut buf = Vec::new();
    reader.by_ref().take(limit as u64).read_to_end(&mut buf)?;
    let rest = io::copy(&mut reader, &mut io::sink())?;
    Ok((buf, rest > 0))
}
