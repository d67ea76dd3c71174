use std::path::Path;

use crate::config::AuditConfig;
use crate::error::CheckFailure;
use crate::exec::{Output, command_line, run_bounded};

/// Run the project's build and require a zero exit (and the output directory,
/// when one is configured).
pub async fn verify_build(root: &Path, cfg: &AuditConfig) -> Result<(), CheckFailure> {
    let build = &cfg.build;
    let command = command_line(&build.program, &build.args);
    let status = run_bounded(
        "build",
        &build.program,
        &build.args[..],
        root,
        Output::Inherit,
        cfg.timeouts.build(),
    )
    .await?;
    if !status.success() {
        return Err(CheckFailure::BuildFailure {
            command,
            status: status.to_string(),
        });
    }
    if let Some(dir) = &build.output_dir
        && !root.join(dir).is_dir()
    {
        return Err(CheckFailure::BuildFailure {
            command,
            status: format!("success but produced no {}", dir.display()),
        });
    }
    Ok(())
}

/// Ask the cloud CLI for the configured project; any non-zero exit means the
/// local identity cannot reach it. Its stdout is discarded; stderr stays
/// visible so the CLI's own explanation reaches the user.
pub async fn verify_auth(root: &Path, cfg: &AuditConfig) -> Result<(), CheckFailure> {
    let args = cfg.auth_args();
    let status = run_bounded(
        "auth",
        &cfg.auth.program,
        &args[..],
        root,
        Output::Quiet,
        cfg.timeouts.auth(),
    )
    .await?;
    if status.success() {
        Ok(())
    } else {
        tracing::debug!(status=%status, "auth: cloud CLI rejected project lookup");
        Err(CheckFailure::AuthUnreachable {
            project_id: cfg.project_id.clone(),
            ci_note: cfg.auth.ci_note.clone(),
        })
    }
}
