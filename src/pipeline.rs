use crate::cli::{ReferenceMode, SamPileupArgs};
use crate::errors::{AppError, Result};
use crate::external_tools::ExternalTools;
use crate::workspace::ScratchWorkspace;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Runs the whole conversion: version probe, staging, optional reference
/// indexing, the pileup command itself, and output validation. The scratch
/// workspace lives only inside [`run_pileup`], so it is gone by the time the
/// output file is inspected, on failure paths included.
pub fn run(args: &SamPileupArgs) -> Result<()> {
    info!(
        input = %args.input1,
        output = %args.output1,
        mode = ?args.ref_mode,
        consensus = args.consensus.is_some(),
        "starting pileup run"
    );
    let tools = ExternalTools::from_args(args);
    println!("{}", tools.probe_version());

    let output = PathBuf::from(&args.output1);
    run_pileup(args, &tools, &output)?;

    validate_output(&output)?;
    println!("Converted BAM to pileup");
    info!(output = %output.display(), "completed pileup run");
    Ok(())
}

fn run_pileup(args: &SamPileupArgs, tools: &ExternalTools, output: &Path) -> Result<()> {
    let workspace = ScratchWorkspace::create()?;
    let staged_bam = workspace.stage_alignment(Path::new(&args.input1))?;
    workspace.stage_alignment_index(Path::new(&args.bam_index))?;

    let reference = resolve_reference(args, tools, &workspace)?;

    let pileup = tools.pileup_command(args, &reference, &staged_bam, workspace.path());
    let result = tools.run_command(&pileup, Some(output))?;
    if !result.success {
        return Err(AppError::CommandFailed {
            command: pileup.rendered(),
            code: result.code,
            stderr: result.stderr,
        });
    }

    workspace.close()
}

/// Picks the reference path for the pileup command. Mode `indexed` uses the
/// operator-supplied pre-indexed genome and insists on its `.fai` companion
/// existing up front; mode `history` stages the user reference into the
/// workspace and runs `samtools faidx` against the staged link first.
fn resolve_reference(
    args: &SamPileupArgs,
    tools: &ExternalTools,
    workspace: &ScratchWorkspace,
) -> Result<PathBuf> {
    match args.ref_mode {
        ReferenceMode::Indexed => {
            let index = args.index.as_deref().ok_or_else(|| AppError::MissingRequired {
                field: "--index (required when --ref is indexed)".to_string(),
            })?;
            // resolve now: the pileup child runs inside the workspace, where a
            // relative genome path would no longer mean anything
            let reference = fs::canonicalize(index)?;
            let fai = PathBuf::from(format!("{}.fai", reference.display()));
            if !fai.exists() {
                return Err(AppError::MissingReferenceIndex {
                    reference,
                    index: fai,
                });
            }
            Ok(reference)
        }
        ReferenceMode::History => {
            let own_file = args
                .own_file
                .as_deref()
                .ok_or_else(|| AppError::MissingRequired {
                    field: "--ownFile (required when --ref is history)".to_string(),
                })?;
            let staged_reference = workspace.stage_reference(Path::new(own_file))?;
            let faidx = tools.faidx_command(&staged_reference, workspace.path());
            let result = tools.run_command(&faidx, None)?;
            if !result.success {
                return Err(AppError::CommandFailed {
                    command: faidx.rendered(),
                    code: result.code,
                    stderr: result.stderr,
                });
            }
            Ok(staged_reference)
        }
    }
}

/// A clean pileup exit with an absent or zero-length output file is its own
/// failure: the tool ran but produced no matching records.
fn validate_output(path: &Path) -> Result<()> {
    let size = fs::metadata(path).map(|meta| meta.len()).unwrap_or(0);
    if size == 0 {
        return Err(AppError::EmptyOutput {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
