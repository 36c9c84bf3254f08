//! Stage progress on stderr.
//!
//! stdout may carry the report itself (`-o -`), so every line here goes to
//! stderr. The spinner only runs when stderr is a terminal.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{OwoColorize, Stream};
use repotally_core::PipelineEvent;

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"];

/// Renders [`PipelineEvent`]s for a human watching the terminal.
#[derive(Debug)]
pub struct Progress {
    quiet: bool,
    interactive: bool,
    spinner: Option<ProgressBar>,
}

impl Progress {
    /// A progress display; `quiet` suppresses everything.
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            interactive: std::io::stderr().is_terminal(),
            spinner: None,
        }
    }

    /// Handle one workflow event.
    pub fn handle(&mut self, event: PipelineEvent) {
        if self.quiet {
            return;
        }
        match event {
            PipelineEvent::Started(stage) => {
                self.clear();
                if self.interactive {
                    let spinner = ProgressBar::new_spinner();
                    if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
                        spinner.set_style(style.tick_strings(TICKS));
                    }
                    spinner.set_message(format!("{stage}..."));
                    spinner.enable_steady_tick(Duration::from_millis(80));
                    self.spinner = Some(spinner);
                }
            }
            PipelineEvent::Finished(stage, message) => {
                self.clear();
                eprintln!(
                    "  {} {} {}",
                    "✓".if_supports_color(Stream::Stderr, |t| t.green()),
                    stage.if_supports_color(Stream::Stderr, |t| t.bold()),
                    message.if_supports_color(Stream::Stderr, |t| t.dimmed()),
                );
            }
            PipelineEvent::Skipped(stage, reason) => {
                self.clear();
                eprintln!(
                    "  {} {} {}",
                    "–".if_supports_color(Stream::Stderr, |t| t.yellow()),
                    stage.if_supports_color(Stream::Stderr, |t| t.bold()),
                    format!("skipped: {reason}").if_supports_color(Stream::Stderr, |t| t.dimmed()),
                );
            }
        }
    }

    /// Clear any spinner left running, e.g. when a stage failed.
    pub fn finish(&mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repotally_core::Stage;

    #[test]
    fn quiet_progress_never_spins() {
        let mut progress = Progress::new(true);
        progress.handle(PipelineEvent::Started(Stage::Tally));
        assert!(progress.spinner.is_none());
    }

    #[test]
    fn finished_stage_clears_spinner() {
        let mut progress = Progress {
            quiet: false,
            interactive: true,
            spinner: None,
        };
        progress.handle(PipelineEvent::Started(Stage::Manifest));
        assert!(progress.spinner.is_some());
        progress.handle(PipelineEvent::Finished(Stage::Manifest, "3 private repo(s)".into()));
        assert!(progress.spinner.is_none());
    }
}
