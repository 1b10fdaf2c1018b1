use std::io::{self, BufWriter, Write};
use std::path::Path;

use clap::Subcommand;
use plandoc_core::{PlanDocument, VerifierOptions, VersionPolicy};
use plandoc_error::{Result, ResultExt};
use tracing::{debug, info};

use crate::args::{CheckVersionArgs, InspectArgs, OutputFormat, VerifyArgs};
use crate::summary::PlanSummary;

#[derive(Subcommand)]
pub enum Commands {
    /// Print the version, operators and parameters of a plan document.
    Inspect(InspectArgs),
    /// Verify the structure of a plan document.
    Verify(VerifyArgs),
    /// Check that a plan document's version is one of the accepted versions.
    CheckVersion(CheckVersionArgs),
}

impl Commands {
    pub fn run(self) -> Result<()> {
        let mut stdout = BufWriter::new(io::stdout());
        match self {
            Commands::Inspect(inspect) => inspect.run(&mut stdout)?,
            Commands::Verify(verify) => verify.run(&mut stdout)?,
            Commands::CheckVersion(check) => check.run(&mut stdout)?,
        }
        stdout.flush()?;
        Ok(())
    }
}

trait RunCommand {
    fn run(self, out: &mut impl Write) -> Result<()>;
}

fn read_document(path: &Path) -> Result<PlanDocument> {
    let buf = std::fs::read(path)
        .context_fn(|| format!("Failed to read plan document '{}'", path.display()))?;
    debug!(path = %path.display(), bytes = buf.len(), "read plan document");
    Ok(PlanDocument::new(buf))
}

impl RunCommand for InspectArgs {
    fn run(self, out: &mut impl Write) -> Result<()> {
        let doc = read_document(&self.file)?;
        let view = if self.verify {
            doc.verified_view(&VerifierOptions::default())?
        } else {
            doc.view()?
        };

        let summary = PlanSummary::from_view(doc.len(), view)?;
        match self.format {
            OutputFormat::Text => write!(out, "{summary}")?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *out, &summary)
                    .context("Failed to write plan summary")?;
                writeln!(out)?;
            }
        }

        Ok(())
    }
}

impl RunCommand for VerifyArgs {
    fn run(self, out: &mut impl Write) -> Result<()> {
        let doc = read_document(&self.file)?;
        let opts = self.verifier_options();
        doc.verified_view(&opts)?;

        info!(path = %self.file.display(), "plan document verified");
        writeln!(out, "ok: {} bytes", doc.len())?;

        Ok(())
    }
}

impl RunCommand for CheckVersionArgs {
    fn run(self, out: &mut impl Write) -> Result<()> {
        let doc = read_document(&self.file)?;
        let view = doc.view()?;
        let policy = VersionPolicy::allow(self.accept);
        view.check_version(&policy)?;

        match view.rel_plan_version()? {
            Some(version) => writeln!(out, "accepted: {version}")?,
            None => writeln!(out, "accepted: no version set")?,
        }

        Ok(())
    }
}
