use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::binding::check_binding;
use crate::config::AuditConfig;
use crate::deep::{verify_auth, verify_build};
use crate::error::CheckFailure;
use crate::exec::command_line;
use crate::integrity::{Integrity, check_integrity};
use crate::presence::check_present;
use crate::report::Reporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Minor,
    Major,
}

impl Mode {
    /// Only the literal `--major` selects the deep audit; anything else,
    /// including no argument at all, is a minor audit.
    pub fn from_arg(arg: Option<&str>) -> Mode {
        match arg {
            Some("--major") => Mode::Major,
            _ => Mode::Minor,
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            Mode::Minor => "--minor",
            Mode::Major => "--major",
        }
    }
}

/// Stages of an audit, in the only order they can be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    GitChecked,
    FilesChecked,
    BindingChecked,
    DeepAuditChecked,
    DeepAuditSkipped,
    Done,
}

#[derive(Debug)]
pub enum AuditOutcome {
    Passed { mode: Mode },
    /// `after` is the last stage completed before the failing check.
    Failed { after: Stage, failure: CheckFailure },
}

impl AuditOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            AuditOutcome::Passed { .. } => 0,
            AuditOutcome::Failed { .. } => 1,
        }
    }
}

pub struct Auditor<'a, W: Write> {
    cfg: &'a AuditConfig,
    root: PathBuf,
    report: Reporter<W>,
    stage: Stage,
}

impl<'a, W: Write> Auditor<'a, W> {
    pub fn new(cfg: &'a AuditConfig, root: &Path, out: W) -> Self {
        Self {
            cfg,
            root: root.to_path_buf(),
            report: Reporter::new(out),
            stage: Stage::Start,
        }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.report.into_inner()
    }

    /// Run every layer in order. The first fatal check ends the audit; a write
    /// error on the output stream is the only `Err`.
    pub async fn run(&mut self, mode: Mode) -> Result<AuditOutcome> {
        self.report
            .banner(&format!("Initiating Kontrol audit ({})...", mode.flag()))?;
        self.report.rule()?;

        let outcome = match self.checks(mode).await {
            Ok(()) => AuditOutcome::Passed { mode },
            Err(Halt::Failed(failure)) => {
                self.report.fail(&failure)?;
                tracing::debug!(after=?self.stage, "audit: failed: {}", failure);
                AuditOutcome::Failed {
                    after: self.stage,
                    failure,
                }
            }
            Err(Halt::Output(err)) => return Err(err.into()),
        };
        self.report.flush()?;
        Ok(outcome)
    }

    async fn checks(&mut self, mode: Mode) -> Result<(), Halt> {
        self.integrity().await?;
        self.advance(Stage::GitChecked);

        self.presence()?;
        self.advance(Stage::FilesChecked);

        self.bindings().await?;
        self.advance(Stage::BindingChecked);

        match mode {
            Mode::Major => {
                self.deep_audit().await?;
                self.advance(Stage::DeepAuditChecked);
            }
            Mode::Minor => {
                self.report.rule()?;
                self.report.icon("⚡", "LIGHT FORENSIC AUDIT COMPLETE")?;
                self.advance(Stage::DeepAuditSkipped);
            }
        }

        self.report.rule()?;
        self.report
            .icon("🏁", "Kontrol repo aligned with deployment substrate ✅")?;
        self.advance(Stage::Done);
        Ok(())
    }

    fn advance(&mut self, next: Stage) {
        tracing::debug!(from=?self.stage, to=?next, "audit: stage");
        self.stage = next;
    }

    async fn integrity(&mut self) -> Result<(), Halt> {
        self.report.step("Checking Git Status...")?;
        match check_integrity(&self.root, self.cfg.timeouts.git()).await {
            Integrity::Clean => self.report.pass("Git Status: Clean.")?,
            Integrity::Dirty(lines) => {
                self.report.warn("ALERT: Local substrate is DIRTY.")?;
                for line in &lines {
                    self.report.detail(line)?;
                }
            }
            Integrity::Unavailable(reason) => {
                self.report.warn(&format!("Git Status unavailable: {}", reason))?;
            }
        }
        Ok(())
    }

    fn presence(&mut self) -> Result<(), Halt> {
        self.report
            .step("Verifying Kontrol Configuration Substrates...")?;
        let cfg = self.cfg;
        for rel in &cfg.required_files {
            check_present(&self.root, rel)?;
            self.report.pass(&format!("Presence: {}", rel.display()))?;
        }
        Ok(())
    }

    async fn bindings(&mut self) -> Result<(), Halt> {
        let cfg = self.cfg;
        for binding in &cfg.bindings {
            let hit = check_binding(&self.root, binding).await?;
            self.report
                .pass(&format!("{}: {}", hit.label, hit.summary))?;
        }
        Ok(())
    }

    async fn deep_audit(&mut self) -> Result<(), Halt> {
        self.report.rule()?;
        self.report
            .icon("🏗️", "DEEP KONTROL SUBSTRATE AUDIT INITIATED")?;

        let build = command_line(&self.cfg.build.program, &self.cfg.build.args);
        self.report
            .icon("🔨", &format!("Executing Dry-run Build: {}", build))?;
        // Keep our lines ordered ahead of the child's inherited output.
        self.report.flush()?;
        verify_build(&self.root, self.cfg).await?;
        self.report.pass("Build: Success")?;

        self.report.icon(
            "🔐",
            &format!("Verifying cloud CLI access to {}...", self.cfg.project_id),
        )?;
        verify_auth(&self.root, self.cfg).await?;
        self.report.pass(&format!(
            "Identity: cloud CLI can reach project {}.",
            self.cfg.project_id
        ))?;
        Ok(())
    }
}

/// Why the check sequence stopped before the end.
#[derive(Debug)]
enum Halt {
    /// A mandatory check failed; reported, then the audit ends.
    Failed(CheckFailure),
    /// The report could not be written.
    Output(io::Error),
}

impl From<CheckFailure> for Halt {
    fn from(failure: CheckFailure) -> Self {
        Halt::Failed(failure)
    }
}

impl From<io::Error> for Halt {
    fn from(err: io::Error) -> Self {
        Halt::Output(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn substrate(root: &Path) {
        write_file(
            root,
            ".firebaserc",
            r#"{"targets":{"rpr-myaudit":{"hosting":{"kontrol":["myaudit-kontrol-dashboard"]}}}}"#,
        );
        write_file(root, "firebase.json", r#"{"hosting":{"public":"dist-kontrol"}}"#);
        write_file(root, "package.json", r#"{"scripts":{"build:kontrol":"vite build"}}"#);
        write_file(root, ".github/workflows/firebase-hosting-merge.yml", "jobs: {}\n");
    }

    fn marker_config(build: &str, auth: &str) -> AuditConfig {
        let mut cfg = AuditConfig::default();
        cfg.build.program = "sh".into();
        cfg.build.args = vec!["-c".into(), build.into()];
        cfg.auth.program = "sh".into();
        cfg.auth.args = vec!["-c".into(), auth.into()];
        cfg
    }

    async fn audit(cfg: &AuditConfig, root: &Path, mode: Mode) -> (AuditOutcome, String) {
        let mut auditor = Auditor::new(cfg, root, Vec::new());
        let outcome = auditor.run(mode).await.unwrap();
        let text = String::from_utf8(auditor.into_output()).unwrap();
        (outcome, text)
    }

    #[test]
    fn mode_defaults_to_minor() {
        assert_eq!(Mode::from_arg(None), Mode::Minor);
        assert_eq!(Mode::from_arg(Some("--minor")), Mode::Minor);
        assert_eq!(Mode::from_arg(Some("--majr")), Mode::Minor);
        assert_eq!(Mode::from_arg(Some("major")), Mode::Minor);
        assert_eq!(Mode::from_arg(Some("--major")), Mode::Major);
    }

    #[tokio::test]
    async fn minor_audit_passes_without_deep_commands() {
        let td = tempfile::tempdir().unwrap();
        substrate(td.path());
        let cfg = marker_config("touch build-ran", "touch auth-ran");

        let (outcome, text) = audit(&cfg, td.path(), Mode::Minor).await;
        assert_eq!(outcome.exit_code(), 0);
        assert!(text.contains("LIGHT FORENSIC AUDIT COMPLETE"));
        assert!(text.contains("✅ Path Alignment: firebase.json → hosting.public = dist-kontrol"));
        assert!(!td.path().join("build-ran").exists());
        assert!(!td.path().join("auth-ran").exists());
    }

    #[tokio::test]
    async fn missing_file_short_circuits_presence() {
        let td = tempfile::tempdir().unwrap();
        substrate(td.path());
        fs::remove_file(td.path().join("firebase.json")).unwrap();

        let (outcome, text) = audit(&AuditConfig::default(), td.path(), Mode::Minor).await;
        assert_eq!(outcome.exit_code(), 1);
        assert!(matches!(
            outcome,
            AuditOutcome::Failed {
                after: Stage::GitChecked,
                failure: CheckFailure::MissingConfigFile { .. }
            }
        ));
        assert!(text.contains("✅ Presence: .firebaserc"));
        assert!(text.contains("❌ MISSING: firebase.json"));
        assert!(!text.contains("package.json"));
        assert!(!text.contains("Target Binding"));
    }

    #[tokio::test]
    async fn wrong_public_dir_fails_alignment() {
        let td = tempfile::tempdir().unwrap();
        substrate(td.path());
        write_file(td.path(), "firebase.json", r#"{"hosting":{"public":"dist"}}"#);

        let (outcome, text) = audit(&AuditConfig::default(), td.path(), Mode::Minor).await;
        assert_eq!(outcome.exit_code(), 1);
        assert!(matches!(
            outcome,
            AuditOutcome::Failed {
                after: Stage::FilesChecked,
                ..
            }
        ));
        assert!(text.contains("✅ Target Binding: myaudit-kontrol-dashboard found in .firebaserc"));
        assert!(text.contains("❌ PATH ERROR: firebase.json"));
        assert!(!text.contains("LIGHT FORENSIC AUDIT COMPLETE"));
    }

    #[tokio::test]
    async fn build_failure_skips_auth() {
        let td = tempfile::tempdir().unwrap();
        substrate(td.path());
        let cfg = marker_config("exit 1", "touch auth-ran");

        let (outcome, text) = audit(&cfg, td.path(), Mode::Major).await;
        assert_eq!(outcome.exit_code(), 1);
        assert!(matches!(
            outcome,
            AuditOutcome::Failed {
                after: Stage::BindingChecked,
                failure: CheckFailure::BuildFailure { .. }
            }
        ));
        assert!(text.contains("Check the build configuration or dependencies."));
        assert!(!td.path().join("auth-ran").exists());
    }

    #[tokio::test]
    async fn major_audit_reports_build_and_identity() {
        let td = tempfile::tempdir().unwrap();
        substrate(td.path());
        let cfg = marker_config("touch build-ran", "touch auth-ran");

        let (outcome, text) = audit(&cfg, td.path(), Mode::Major).await;
        assert!(matches!(outcome, AuditOutcome::Passed { mode: Mode::Major }));
        assert!(text.contains("✅ Build: Success"));
        assert!(text.contains("✅ Identity: cloud CLI can reach project rpr-myaudit."));
        assert!(!text.contains("LIGHT FORENSIC AUDIT COMPLETE"));
        assert!(td.path().join("build-ran").exists());
        assert!(td.path().join("auth-ran").exists());
    }

    #[tokio::test]
    async fn auth_failure_prints_ci_note() {
        let td = tempfile::tempdir().unwrap();
        substrate(td.path());
        let cfg = marker_config("exit 0", "exit 1");

        let (outcome, text) = audit(&cfg, td.path(), Mode::Major).await;
        assert_eq!(outcome.exit_code(), 1);
        assert!(text.contains("❌ AUTH ERROR: cloud CLI cannot reach rpr-myaudit"));
        assert!(text.contains("   Note: In GitHub CI, auth is handled by"));
    }

    /// Accepts output until the presence step starts, then reports a broken pipe.
    struct PipeClosesAtPresence;

    impl Write for PipeClosesAtPresence {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.starts_with(b"Verifying") {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn write_error_is_an_error_not_a_failed_check() {
        let td = tempfile::tempdir().unwrap();
        substrate(td.path());
        let cfg = AuditConfig::default();
        let mut auditor = Auditor::new(&cfg, td.path(), PipeClosesAtPresence);
        let err = auditor.run(Mode::Minor).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<io::Error>().map(io::Error::kind),
            Some(io::ErrorKind::BrokenPipe)
        );
        assert_eq!(auditor.stage, Stage::GitChecked);
    }

    #[tokio::test]
    async fn missing_binding_file_halts_after_presence() {
        let td = tempfile::tempdir().unwrap();
        substrate(td.path());
        let mut cfg = AuditConfig::default();
        cfg.bindings[1].file = PathBuf::from("hosting.json");

        let (outcome, text) = audit(&cfg, td.path(), Mode::Major).await;
        assert!(matches!(
            outcome,
            AuditOutcome::Failed {
                after: Stage::FilesChecked,
                failure: CheckFailure::MissingConfigFile { .. }
            }
        ));
        assert!(text.contains("❌ MISSING: hosting.json"));
        assert!(!text.contains("DEEP KONTROL"));
    }
}
