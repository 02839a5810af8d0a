use crate::cli::SamPileupArgs;
use crate::errors::{AppError, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::{Builder, NamedTempFile};
use tracing::info;

/// Stderr is read back from its capture file in fixed-size chunks so a very
/// verbose failing tool cannot force one huge read.
const STDERR_READ_CHUNK: usize = 1024 * 1024;

pub const VERSION_UNKNOWN: &str = "Could not determine Samtools version";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTools {
    pub samtools: String,
}

/// A fully assembled external invocation: argument vector plus the working
/// directory it runs in. Built once, executed once, discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
}

impl ToolCommand {
    pub fn rendered(&self) -> String {
        let mut text = self.program.clone();
        for arg in &self.args {
            text.push(' ');
            text.push_str(arg);
        }
        text
    }
}

/// Exit status and captured diagnostic text of a completed child process.
/// A non-zero exit is data for the caller, not an error raised here.
#[derive(Debug)]
pub struct ProcessResult {
    pub code: Option<i32>,
    pub success: bool,
    pub stderr: String,
}

impl ExternalTools {
    pub fn from_args(args: &SamPileupArgs) -> Self {
        Self {
            samtools: args.samtools.clone(),
        }
    }

    /// Best-effort version probe: run samtools with no operands (it prints
    /// usage text with a version line regardless of exit status) and scan for
    /// a line containing "version". Never fatal; any failure degrades to the
    /// placeholder message.
    pub fn probe_version(&self) -> String {
        let output = match Command::new(&self.samtools).stdin(Stdio::null()).output() {
            Ok(output) => output,
            Err(_) => return VERSION_UNKNOWN.to_string(),
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        for line in text.lines() {
            if line.to_lowercase().contains("version") {
                return format!("Samtools {}", line.trim());
            }
        }
        VERSION_UNKNOWN.to_string()
    }

    /// `samtools faidx <reference>`, run inside the workspace so the `.fai`
    /// lands next to the staged reference link.
    pub fn faidx_command(&self, reference: &Path, workdir: &Path) -> ToolCommand {
        ToolCommand {
            program: self.samtools.clone(),
            args: vec![
                "faidx".to_string(),
                reference.to_string_lossy().into_owned(),
            ],
            workdir: workdir.to_path_buf(),
        }
    }

    /// `samtools pileup [-s] [-i] -M <cap> [-c -T <theta> -N <hap> -r <frac>
    /// -I <phred>] -f <reference> <bam>`. The `-s`/`-i` flags depend solely on
    /// their own booleans; the consensus block appears only when consensus
    /// calling is enabled.
    pub fn pileup_command(
        &self,
        args: &SamPileupArgs,
        reference: &Path,
        bam: &Path,
        workdir: &Path,
    ) -> ToolCommand {
        let mut argv = vec!["pileup".to_string()];
        if args.last_col {
            argv.push("-s".to_string());
        }
        if args.indels {
            argv.push("-i".to_string());
        }
        argv.push("-M".to_string());
        argv.push(args.map_cap.to_string());
        if let Some(consensus) = &args.consensus {
            argv.push("-c".to_string());
            argv.push("-T".to_string());
            argv.push(consensus.theta.to_string());
            argv.push("-N".to_string());
            argv.push(consensus.hap_num.to_string());
            argv.push("-r".to_string());
            argv.push(consensus.fraction.to_string());
            argv.push("-I".to_string());
            argv.push(consensus.phred_prob.to_string());
        }
        argv.push("-f".to_string());
        argv.push(reference.to_string_lossy().into_owned());
        argv.push(bam.to_string_lossy().into_owned());

        ToolCommand {
            program: self.samtools.clone(),
            args: argv,
            workdir: workdir.to_path_buf(),
        }
    }

    /// Runs the command synchronously with stderr captured to a tempfile in
    /// the command's working directory. When `stdout_to` is set, the child's
    /// stdout is redirected into that file, which this process creates (the
    /// path is resolved against the invoking directory, not the workspace).
    /// Blocks until the child exits; no timeout, no retry.
    pub fn run_command(
        &self,
        command: &ToolCommand,
        stdout_to: Option<&Path>,
    ) -> Result<ProcessResult> {
        let stderr_capture = Builder::new()
            .prefix("sam_pileup_cmd_stderr_")
            .suffix(".log")
            .tempfile_in(&command.workdir)?;
        let stderr_file = stderr_capture.reopen()?;

        let mut child = Command::new(&command.program);
        child
            .args(&command.args)
            .current_dir(&command.workdir)
            .stdin(Stdio::null())
            .stderr(Stdio::from(stderr_file));
        if let Some(path) = stdout_to {
            child.stdout(Stdio::from(File::create(path)?));
        }

        info!(command = %command.rendered(), "spawning external command");
        let status = child.status().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                AppError::CommandNotFound {
                    command: command.program.clone(),
                }
            } else {
                AppError::Io(err)
            }
        })?;

        let stderr = read_capture_chunked(&stderr_capture)?;
        info!(
            command = %command.rendered(),
            code = ?status.code(),
            "external command completed"
        );

        Ok(ProcessResult {
            code: status.code(),
            success: status.success(),
            stderr,
        })
    }
}

fn read_capture_chunked(capture: &NamedTempFile) -> Result<String> {
    let mut file = capture.reopen()?;
    let mut bytes = Vec::new();
    let mut chunk = vec![0u8; STDERR_READ_CHUNK];
    loop {
        let read = file.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..read]);
    }
    Ok(String::from_utf8_lossy(&bytes).to_string())
}
