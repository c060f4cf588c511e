use std::cmp::min;
use std::env;

use console::{strip_ansi_codes, style, truncate_str, Style, Term};
use log::debug;

use crate::host::{Notifier, ProgressIndicator, Prompter};
use crate::kind::ClusterSettings;
use crate::output::Cancellable;

const WINDOW_LENGTH: usize = 10;

/// Returns whether the "windowed" UI is enabled or not.
/// If disabled, output is (mostly) just passed through.
fn ui_enabled(term: &Term) -> bool {
    if env::var_os("KINDLING_NO_UI").is_some() {
        return false;
    }

    term.features().is_attended()
}

/// Helper to clear lines depending on whether or not UI is enabled
fn clear_last_lines(term: &Term, n: usize) {
    if ui_enabled(term) {
        if let Err(e) = term.clear_last_lines(n) {
            debug!("Failed to clear terminal lines: {}", e);
        }
    }
}

/// Write a line, ignoring failures.
///
/// There is nobody left to report a broken terminal to.
fn write_line(term: &Term, line: &str) {
    if let Err(e) = term.write_line(line) {
        debug!("Failed to write terminal: {}", e);
    }
}

/// Returns an unstyled heading
fn heading(title: &str) -> String {
    format!("==> {}", title)
}

/// Console progress indicator.
///
/// Shows the title as a heading with a small scrolling window of the most
/// recent progress messages underneath. The window is cleared when the
/// operation finishes.
pub struct ConsoleProgress {
    term: Term,
    lines: Vec<String>,
}

impl ConsoleProgress {
    /// Construct a progress indicator writing to stdout
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
            lines: Vec::new(),
        }
    }

    /// Returns the current active window size
    ///
    /// Pass-through mode only ever has the last line on screen.
    fn window_size(&self) -> usize {
        if ui_enabled(&self.term) {
            min(self.lines.len(), WINDOW_LENGTH)
        } else {
            min(self.lines.len(), 1)
        }
    }

    /// Add a line to the output window.
    ///
    /// If over the window size, older text will be cleared from the screen.
    fn print_line(&mut self, line: &str) {
        clear_last_lines(&self.term, self.window_size());

        let trimmed_line = line.trim_end();
        let styled_line = if ui_enabled(&self.term) {
            // We do our own styling, so drop whatever came with the text
            let stripped = strip_ansi_codes(trimmed_line);

            // Clip output to fit in terminal.
            //
            // Wide characters (kind is fond of emoji) can still wrap. Set
            // KINDLING_NO_UI if that corrupts the window.
            let width = self.term.size_checked().map(|(_, w)| w).unwrap_or(u16::MAX);
            let clipped = truncate_str(&stripped, width as usize, "...");
            style(clipped).dim().to_string()
        } else {
            trimmed_line.to_string()
        };
        self.lines.push(styled_line);

        let start = self.lines.len() - self.window_size();
        for line in &self.lines[start..] {
            write_line(&self.term, line);
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressIndicator for ConsoleProgress {
    fn begin(&mut self, title: &str) {
        self.lines.clear();
        write_line(&self.term, &heading(title));
    }

    fn report(&mut self, message: &str) {
        // A message may span lines; the window works line by line
        for line in message.lines() {
            self.print_line(line);
        }
    }

    fn finish(&mut self) {
        clear_last_lines(&self.term, self.window_size());
        self.lines.clear();
    }
}

/// Prints notifications to the console
pub struct ConsoleNotifier {
    out: Term,
    err: Term,
}

impl ConsoleNotifier {
    /// Construct a notifier writing to stdout and stderr
    pub fn new() -> Self {
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
        }
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ConsoleNotifier {
    fn info(&self, message: &str) {
        write_line(&self.out, &Style::new().green().apply_to(message).to_string());
    }

    fn error(&self, message: &str) {
        // Diagnostics from kind are often multi-line
        for line in message.trim_end().lines() {
            write_line(&self.err, &Style::new().red().bright().apply_to(line).to_string());
        }
    }
}

/// Asks questions on the console.
///
/// When nobody is attending the terminal, the defaults are taken and
/// destructive actions are only confirmed if `assume_yes` is set.
pub struct ConsolePrompter {
    term: Term,
    defaults: ClusterSettings,
    settings_given: bool,
    assume_yes: bool,
}

impl ConsolePrompter {
    /// Construct a prompter.
    ///
    /// `defaults` pre-fill the cluster settings prompt.
    pub fn new(defaults: ClusterSettings, assume_yes: bool) -> Self {
        Self {
            term: Term::stdout(),
            defaults,
            settings_given: false,
            assume_yes,
        }
    }

    /// Use `defaults` as the cluster settings without asking
    pub fn settings_given(mut self, given: bool) -> Self {
        self.settings_given = given;
        self
    }

    /// Ask a question, returning `None` if input could not be read
    fn ask(&self, question: &str) -> Option<String> {
        if let Err(e) = self.term.write_str(question) {
            debug!("Failed to write prompt: {}", e);
            return None;
        }
        match self.term.read_line() {
            Ok(s) => Some(s.trim().to_string()),
            Err(e) => {
                debug!("Failed to read answer: {}", e);
                None
            }
        }
    }
}

impl Prompter for ConsolePrompter {
    fn cluster_settings(&self) -> Cancellable<ClusterSettings> {
        if self.settings_given || !ui_enabled(&self.term) {
            return Cancellable::Value(self.defaults.clone());
        }

        let name = match self.ask(&format!("Cluster name [{}]: ", self.defaults.name)) {
            Some(n) if n.is_empty() => self.defaults.name.clone(),
            Some(n) => n,
            None => return Cancellable::Cancelled,
        };
        let default_image = self.defaults.image.clone().unwrap_or_default();
        let image = match self.ask(&format!(
            "Image version (blank for default) [{}]: ",
            default_image
        )) {
            Some(i) if i.is_empty() => default_image,
            Some(i) => i,
            None => return Cancellable::Cancelled,
        };

        Cancellable::Value(ClusterSettings::new(name, Some(&image)))
    }

    fn confirm(&self, text: &str, confirm_label: &str) -> bool {
        if !ui_enabled(&self.term) {
            return self.assume_yes;
        }

        let answer = self.ask(&format!("{} {} [y/N]: ", text, confirm_label));
        matches!(answer.as_deref(), Some("y") | Some("Y") | Some("yes"))
    }

    fn pick_cluster(&self, names: &[String]) -> Cancellable<String> {
        if names.len() == 1 {
            return Cancellable::Value(names[0].clone());
        }
        if names.is_empty() || !ui_enabled(&self.term) {
            return Cancellable::Cancelled;
        }

        for (idx, name) in names.iter().enumerate() {
            write_line(&self.term, &format!("  {}) {}", idx + 1, name));
        }
        let answer = match self.ask("Cluster: ") {
            Some(a) => a,
            None => return Cancellable::Cancelled,
        };

        // Accept either the list index or the name itself
        let picked = answer
            .parse::<usize>()
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| names.get(i))
            .or_else(|| names.iter().find(|n| **n == answer))
            .cloned();
        picked.into()
    }

    fn cluster_name(&self, prompt: &str) -> Cancellable<String> {
        if !ui_enabled(&self.term) {
            return Cancellable::Cancelled;
        }

        match self.ask(&format!("{}: ", prompt)) {
            Some(n) if !n.is_empty() => Cancellable::Value(n),
            _ => Cancellable::Cancelled,
        }
    }
}
