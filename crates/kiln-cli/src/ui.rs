//! Terminal output
//!
//! Column-aligned rows on stdout, progress on stderr.

use std::io::Write;
use std::path::Path;

use crossterm::style::{Color, Stylize};
use kiln_core::Reporter;
use kiln_schema::{Coordinate, EntryOutcome, ExplorationReport};

/// Column widths and colors.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub name_width: usize,
    pub version_width: usize,
    pub name: Color,
    pub version: Color,
    pub secondary: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            name_width: 44,
            version_width: 16,
            name: Color::White,
            version: Color::Cyan,
            secondary: Color::DarkGrey,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
        }
    }
}

pub fn print_header(columns: &[&str]) {
    let theme = Theme::default();
    let header = match columns {
        [name, version, rest @ ..] => format!(
            "  {name:<nw$} {version:<vw$} {}",
            rest.join(" "),
            nw = theme.name_width,
            vw = theme.version_width,
        ),
        _ => format!("  {}", columns.join(" ")),
    };
    println!("{}", header.dark_grey());
}

pub fn print_row(name: &str, version: &str, detail: &str) {
    let theme = Theme::default();
    let name_part = format!("{name:<width$}", width = theme.name_width);
    let version_part = format!("{version:<width$}", width = theme.version_width);
    println!(
        "  {} {} {}",
        name_part.with(theme.name),
        version_part.with(theme.version),
        detail.with(theme.secondary)
    );
}

pub fn print_footer(msg: &str) {
    println!();
    println!("{}", msg.dark_grey());
}

/// One line per type, errors with their cause.
pub fn print_report(report: &ExplorationReport) {
    let theme = Theme::default();
    println!();
    println!("  {}", report.source.display().to_string().bold());
    if let Some(cause) = &report.failure {
        println!("    {} {}", "unreadable".with(theme.error), cause);
        return;
    }
    for entry in &report.entries {
        let (tag, color) = match entry.outcome {
            EntryOutcome::VisualComponent => ("visual", theme.success),
            EntryOutcome::Other => ("other", theme.secondary),
            EntryOutcome::Error => ("error", theme.error),
        };
        let tag = format!("{tag:<7}");
        match &entry.cause {
            Some(cause) => println!(
                "    {} {} {}",
                tag.with(color),
                entry.type_name,
                cause.as_str().with(theme.secondary)
            ),
            None => println!("    {} {}", tag.with(color), entry.type_name),
        }
    }
    if report.restricted {
        println!(
            "    {}",
            "contains restricted vendor components".with(theme.warning)
        );
    }
}

/// Progress on stderr, so stdout stays machine-readable.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    theme: Theme,
}

impl ConsoleReporter {
    fn line(&self, marker: &str, color: Color, msg: &str) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{} {}", marker.with(color), msg);
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", title.to_uppercase().bold());
    }

    fn resolving(&self, coordinate: &Coordinate, repository: &str) {
        self.line(
            "·",
            self.theme.secondary,
            &format!("resolving {coordinate} from {repository}"),
        );
    }

    fn installed(&self, coordinate: &Coordinate, path: &Path) {
        self.line(
            "✓",
            self.theme.success,
            &format!("{coordinate} → {}", path.display()),
        );
    }

    fn failed(&self, subject: &str, reason: &str) {
        self.line("✗", self.theme.error, &format!("{subject}: {reason}"));
    }

    fn exploring(&self, file: &Path, index: usize, total: usize) {
        self.line(
            "·",
            self.theme.secondary,
            &format!("[{}/{total}] exploring {}", index + 1, file.display()),
        );
    }

    fn explored(&self, report: &ExplorationReport) {
        let visual = report.visual_components().count();
        let errors = report.errors().count();
        let color = if errors > 0 {
            self.theme.warning
        } else {
            self.theme.success
        };
        self.line(
            "✓",
            color,
            &format!(
                "{}: {visual} visual, {errors} errors",
                report.source.display()
            ),
        );
    }

    fn info(&self, msg: &str) {
        self.line("·", self.theme.secondary, msg);
    }

    fn warning(&self, msg: &str) {
        self.line("!", self.theme.warning, msg);
    }
}
