//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::{Style, Term};
use plugci_builder::BuildOutput;
use plugci_types::{Diagnostic, OutputFormat, Severity};
use std::io;
use std::path::Path;

/// Output renderer for build reports
#[derive(Clone)]
pub struct OutputRenderer {
    format: OutputFormat,
    term: Term,
}

impl OutputRenderer {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            term: Term::stdout(),
        }
    }

    /// Render the report of one build
    pub fn render_build(&self, output: &BuildOutput, written: Option<&Path>) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => Self::render_json(output, written),
            OutputFormat::Plain => self.render_plain(output, written),
        }
    }

    fn render_json(output: &BuildOutput, written: Option<&Path>) -> io::Result<()> {
        let report = serde_json::json!({
            "main": output.result.main(),
            "worst": output.result.worst_severity(),
            "diagnostics": output.result.diagnostics(),
            "entries": output.archive.len(),
            "output": written.map(|path| path.display().to_string()),
        });
        let json = serde_json::to_string_pretty(&report).map_err(io::Error::other)?;
        println!("{json}");
        Ok(())
    }

    fn render_plain(&self, output: &BuildOutput, written: Option<&Path>) -> io::Result<()> {
        let result = &output.result;
        let worst = result.worst_severity();

        println!("Main class: {}", result.main());
        if result.diagnostics().is_empty() {
            println!("No diagnostics.");
        } else {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec![
                Cell::new("Severity").add_attribute(Attribute::Bold),
                Cell::new("Location").add_attribute(Attribute::Bold),
                Cell::new("Message").add_attribute(Attribute::Bold),
            ]);
            for diagnostic in result.diagnostics() {
                let (location, message) = describe(diagnostic);
                table.add_row(vec![
                    severity_cell(diagnostic.severity()),
                    Cell::new(location),
                    Cell::new(message),
                ]);
            }
            println!("{table}");
        }

        println!(
            "Result: {} ({} entries)",
            self.style_severity(worst),
            output.archive.len()
        );
        if let Some(path) = written {
            println!("Archive written to {}", path.display());
        }
        Ok(())
    }

    fn style_severity(&self, severity: Severity) -> String {
        if !self.term.features().colors_supported() {
            return severity.to_string();
        }
        let style = match severity {
            Severity::Ok => Style::new().green().bold(),
            Severity::Warning | Severity::Lint => Style::new().yellow().bold(),
            Severity::Internal | Severity::BuildError => Style::new().red().bold(),
        };
        style.apply_to(severity).to_string()
    }
}

fn severity_cell(severity: Severity) -> Cell {
    let color = match severity {
        Severity::Ok => Color::Green,
        Severity::Warning | Severity::Lint => Color::Yellow,
        Severity::Internal | Severity::BuildError => Color::Red,
    };
    Cell::new(severity).fg(color)
}

/// Location column and message column of one diagnostic
fn describe(diagnostic: &Diagnostic) -> (String, String) {
    match diagnostic {
        Diagnostic::Lint(finding) => {
            let mut location = finding.source_file.clone().unwrap_or_default();
            if let Some(line) = finding.line {
                location.push_str(&format!(":{line}"));
            }
            if let Some(version) = &finding.target_version {
                location.push_str(&format!(" (api {version})"));
            }
            (location, finding.message.clone())
        }
        Diagnostic::InternalError {
            incident_id,
            message,
        } => (format!("incident {incident_id}"), message.clone()),
        Diagnostic::BuildError { context, .. } | Diagnostic::Warning { context, .. } => {
            (String::new(), context.clone())
        }
    }
}
