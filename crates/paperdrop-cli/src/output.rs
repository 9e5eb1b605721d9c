use std::io::Write;

use owo_colors::OwoColorize;
use paperdrop_core::{CycleReport, Metadata, TitleSource};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print the title resolved for a single file.
pub fn print_metadata(
    w: &mut dyn Write,
    file_name: &str,
    metadata: &Metadata,
    color: ColorMode,
) -> std::io::Result<()> {
    let source = match metadata.source {
        TitleSource::Grobid => "from GROBID",
        TitleSource::FileStem => "from file name, GROBID had no title",
    };
    if color.enabled() {
        writeln!(w, "{}", file_name.bold())?;
        writeln!(w, "  Title: {}", metadata.title.green())?;
        writeln!(w, "  {}", format!("({})", source).dimmed())?;
    } else {
        writeln!(w, "{}", file_name)?;
        writeln!(w, "  Title: {}", metadata.title)?;
        writeln!(w, "  ({})", source)?;
    }
    Ok(())
}

/// Print the counters of a single poll cycle.
pub fn print_cycle_summary(
    w: &mut dyn Write,
    report: &CycleReport,
    color: ColorMode,
) -> std::io::Result<()> {
    if report.found == 0 {
        writeln!(w, "No PDFs waiting.")?;
        return Ok(());
    }

    writeln!(w, "Found {} PDFs", report.found)?;
    if color.enabled() {
        writeln!(w, "  Imported:          {}", report.imported.green())?;
        if report.extract_failed > 0 {
            writeln!(w, "  GROBID failures:   {}", report.extract_failed.red())?;
        }
        if report.upload_failed > 0 {
            writeln!(w, "  Upload failures:   {}", report.upload_failed.red())?;
        }
    } else {
        writeln!(w, "  Imported:          {}", report.imported)?;
        if report.extract_failed > 0 {
            writeln!(w, "  GROBID failures:   {}", report.extract_failed)?;
        }
        if report.upload_failed > 0 {
            writeln!(w, "  Upload failures:   {}", report.upload_failed)?;
        }
    }

    let skipped = report.found - report.imported - report.failed();
    if skipped > 0 {
        writeln!(w, "  Left for next run: {}", skipped)?;
    }
    Ok(())
}
