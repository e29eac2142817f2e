use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use selfup_completion::{CompletionClient, CompletionRequest};
use selfup_engine::CycleReport;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

pub(crate) struct TerminalSpinner {
    progress_bar: Option<ProgressBar>,
    label: String,
    started_at: Instant,
}

/// Wraps a completion client with a spinner for the duration of each call.
pub(crate) struct ProgressClient<C> {
    inner: C,
    renderer: TerminalRenderer,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn current() -> Self {
        Self::from_style(current_output_style())
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_section(self, title: &str) {
        if let Some(line) = render_section_header(self.style, title) {
            println!("{}", colorize(section_style(), &line));
        }
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    pub(crate) fn eprint_lines(self, lines: &[String]) {
        for line in lines {
            eprintln!("{line}");
        }
    }

    pub(crate) fn start_spinner(self, label: &str) -> TerminalSpinner {
        let progress_bar = if self.style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg} {elapsed}")
            {
                progress_bar.set_style(style.tick_chars("-=~* "));
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        TerminalSpinner {
            progress_bar,
            label: label.to_string(),
            started_at: Instant::now(),
        }
    }
}

impl TerminalSpinner {
    pub(crate) fn finish(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
            tracing::debug!(
                label = %self.label,
                elapsed = %format_elapsed(self.started_at.elapsed()),
                "spinner finished"
            );
        }
    }
}

impl<C> ProgressClient<C> {
    pub(crate) fn new(inner: C, renderer: TerminalRenderer) -> Self {
        Self { inner, renderer }
    }
}

impl<C: CompletionClient> CompletionClient for ProgressClient<C> {
    fn complete(&self, request: &CompletionRequest) -> selfup_core::Result<String> {
        let spinner = self.renderer.start_spinner("waiting for completion");
        let result = self.inner.complete(request);
        spinner.finish();
        result
    }
}

pub(crate) fn current_output_style() -> OutputStyle {
    output_style_for(
        std::io::stdout().is_terminal(),
        std::env::var_os("NO_COLOR").is_some(),
    )
}

pub(crate) fn output_style_for(is_terminal: bool, no_color: bool) -> OutputStyle {
    if is_terminal && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let badge = match status {
                "ok" => "[OK]",
                "warn" => "[WARN]",
                "err" => "[ERR]",
                _ => "[..]",
            };
            format!("{badge} {message}")
        }
    }
}

pub(crate) fn format_report_lines(report: &CycleReport, style: OutputStyle) -> Vec<String> {
    let mut lines = vec![
        render_status_line(style, "ok", &format!("upgraded {}", report.file_path)),
        format!("backup: {}", report.backup_path.display()),
        format!("summary: {}", report.summary),
    ];
    if report.next_steps.is_empty() {
        lines.push("next steps: none".to_string());
    } else {
        lines.push("next steps:".to_string());
        for step in &report.next_steps {
            lines.push(format!("- {step}"));
        }
    }
    lines
}

/// The failure and each of its causes, one line apiece.
pub(crate) fn format_error_lines(err: &anyhow::Error, style: OutputStyle) -> Vec<String> {
    let mut lines = vec![render_status_line(style, "err", &err.to_string())];
    for cause in err.chain().skip(1) {
        lines.push(format!("caused by: {cause}"));
    }
    lines
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn render_section_header(style: OutputStyle, title: &str) -> Option<String> {
    match style {
        OutputStyle::Plain => None,
        OutputStyle::Rich => Some(format!("== {title} ==")),
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
