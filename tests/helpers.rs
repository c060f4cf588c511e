#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tempfile::TempDir;

use kindling::host::{ClusterCache, Notifier, ProgressIndicator, Prompter, WizardHost};
use kindling::tracker::LogCommandLog;
use kindling::{Cancellable, ClusterSettings, Kind, KindConfig};

// Writing an executable while another thread forks can leave the write fd
// open in the child, making exec fail with ETXTBSY. Tests that lay down a
// fake `kind` run one at a time.
static SERIAL: Mutex<()> = Mutex::new(());

/// A fake `kind` binary living in a tempdir.
///
/// Every invocation appends its arguments to `<dir>/args`, then runs the
/// provided `case` arms against "$1 $2".
pub struct FakeKind {
    pub kind: Kind,
    dir: TempDir,
    _serial: MutexGuard<'static, ()>,
}

impl FakeKind {
    pub fn new(arms: &str) -> Self {
        let serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        let dir = TempDir::new().expect("Failed to create tempdir");
        let script = dir.path().join("kind");
        let body = format!(
            "#!/bin/sh\nDIR=\"{}\"\necho \"$@\" >> \"$DIR/args\"\ncase \"$1 $2\" in\n{}\n*) echo \"unexpected: $@\" >&2; exit 64;;\nesac\n",
            dir.path().display(),
            arms
        );
        fs::write(&script, body).expect("Failed to write fake kind");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
            .expect("Failed to make fake kind executable");

        let config = KindConfig {
            path: script,
            ..Default::default()
        };
        Self {
            kind: Kind::new(&config, Arc::new(LogCommandLog)),
            dir,
            _serial: serial,
        }
    }

    /// Argument lists of every invocation so far
    pub fn invocations(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("args"))
            .map(|s| s.lines().map(String::from).collect())
            .unwrap_or_default()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    pub titles: Vec<String>,
    pub messages: Vec<String>,
    pub finished: usize,
}

impl ProgressIndicator for RecordingProgress {
    fn begin(&mut self, title: &str) {
        self.titles.push(title.to_string());
    }

    fn report(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }

    fn finish(&mut self) {
        self.finished += 1;
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub infos: RefCell<Vec<String>>,
    pub errors: RefCell<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn info(&self, message: &str) {
        self.infos.borrow_mut().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.borrow_mut().push(message.to_string());
    }
}

#[derive(Default)]
pub struct CountingCache {
    pub refreshes: Cell<usize>,
}

impl ClusterCache for CountingCache {
    fn refresh(&self) {
        self.refreshes.set(self.refreshes.get() + 1);
    }
}

/// Answers prompts from a script. `None` answers cancel.
pub struct ScriptedPrompter {
    pub settings: Option<ClusterSettings>,
    pub confirm: bool,
    pub pick: Option<String>,
    pub typed: Option<String>,
    pub offered: RefCell<Vec<String>>,
    pub asked_free_text: Cell<bool>,
}

impl Default for ScriptedPrompter {
    fn default() -> Self {
        Self {
            settings: Some(ClusterSettings::new("kind", None)),
            confirm: true,
            pick: None,
            typed: None,
            offered: RefCell::new(Vec::new()),
            asked_free_text: Cell::new(false),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn cluster_settings(&self) -> Cancellable<ClusterSettings> {
        self.settings.clone().into()
    }

    fn confirm(&self, _text: &str, _confirm_label: &str) -> bool {
        self.confirm
    }

    fn pick_cluster(&self, names: &[String]) -> Cancellable<String> {
        *self.offered.borrow_mut() = names.to_vec();
        self.pick.clone().into()
    }

    fn cluster_name(&self, _prompt: &str) -> Cancellable<String> {
        self.asked_free_text.set(true);
        self.typed.clone().into()
    }
}

/// Records wizard pages. Optionally "closes" after a number of pages.
#[derive(Default)]
pub struct RecordingHost {
    pub pages: Vec<String>,
    pub close_after: Option<usize>,
}

impl WizardHost for RecordingHost {
    fn show_page(&mut self, html: &str) {
        self.pages.push(html.to_string());
    }

    fn is_closed(&self) -> bool {
        self.close_after
            .map(|n| self.pages.len() >= n)
            .unwrap_or(false)
    }
}
