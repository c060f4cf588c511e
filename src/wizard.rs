//! Multi-page cluster creation wizard.
//!
//! The wizard is driven by form submissions. Every submission names the
//! step that produced it and carries every field collected so far: earlier
//! values ride along as hidden inputs, so no state is kept between pages.
//!
//! ```text
//! SelectClusterType --submit--> settings form --submit--> creating --> done
//! ```
//!
//! Once creation starts there is no way back to the settings form.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

use anyhow::{bail, Error};
use log::{debug, warn};
use serde_derive::Serialize;
use tinytemplate::TinyTemplate;

use crate::host::{ClusterCache, ProgressIndicator, WizardHost};
use crate::kind::{ClusterSettings, Kind};
use crate::output::{Diagnostics, Errorable, ProcessEvent, ProgressStep};
use crate::progress::{run_with_progress, ProgressOutcome};

const FORM_TEMPLATE: &str = include_str!("pages/form.html");
const CREATION_TEMPLATE: &str = include_str!("pages/creation.html");
const MESSAGE_TEMPLATE: &str = include_str!("pages/message.html");

/// Field naming the step a submission came from
pub const SENDING_STEP_KEY: &str = "__sendingstep";
/// Id of the form the host posts back
pub const WIZARD_FORM_NAME: &str = "wizard";
/// Script run by the host when a form's button is pressed
pub const NEXT_PAGE_ACTION: &str = "nextPage()";

/// Field holding the cluster name
pub const CLUSTER_NAME_FIELD: &str = "clustername";
/// Field holding the node image version
pub const IMAGE_VERSION_FIELD: &str = "imageversion";
/// Cluster name used when none was given
pub const DEFAULT_CLUSTER_NAME: &str = "kind";

const PLEASE_WAIT: &str = "Please wait...";
const CREATING_TITLE: &str = "Creating local Kind cluster - please wait";

/// Steps a submission can come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepId {
    /// The host's cluster type picker. Kind was chosen.
    SelectClusterType,
    /// Our cluster settings form
    Settings,
}

type Handler = fn(&Wizard, &FormState) -> Page;

impl StepId {
    /// Wire form of the step id
    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::SelectClusterType => "select-cluster-type",
            StepId::Settings => "settings",
        }
    }

    /// What to do with a submission from this step
    fn handler(self) -> Handler {
        match self {
            StepId::SelectClusterType => Wizard::collect_settings,
            StepId::Settings => Wizard::create_cluster,
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "select-cluster-type" => Ok(StepId::SelectClusterType),
            "settings" => Ok(StepId::Settings),
            _ => bail!("Unknown wizard step '{}'", s),
        }
    }
}

/// Every field submitted so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState(BTreeMap<String, String>);

impl FormState {
    /// State of a freshly started wizard, as posted by the host's picker
    pub fn initial() -> Self {
        let mut s = Self::default();
        s.set(SENDING_STEP_KEY, StepId::SelectClusterType.as_str());
        s
    }

    /// Look up a field
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Add or overwrite a field
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.0.insert(name.into(), value.into());
    }

    /// Fold `later` into this state. Fields are only ever added or overwritten.
    pub fn merge(&mut self, later: FormState) {
        self.0.extend(later.0);
    }

    /// Raw step id of the page that produced this submission
    pub fn sending_step(&self) -> Option<&str> {
        self.get(SENDING_STEP_KEY)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no fields were submitted
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fields to carry into the next page (the step marker is re-issued by
    /// every form)
    fn carried(&self) -> Vec<Field> {
        self.0
            .iter()
            .filter(|(k, _)| k.as_str() != SENDING_STEP_KEY)
            .map(|(k, v)| Field {
                name: k.clone(),
                value: v.clone(),
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormState {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
struct Field {
    name: String,
    value: String,
}

/// A visible text input on a form
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Input {
    /// Text shown next to the input
    pub label: String,
    /// Field name the value is submitted under
    pub name: String,
    /// Initial value
    pub value: String,
}

#[derive(Serialize)]
struct FormContext<'a> {
    title: &'a str,
    form_name: &'a str,
    step_key: &'a str,
    step_id: &'a str,
    carried: Vec<Field>,
    inputs: &'a [Input],
    button: Option<&'a str>,
    next_action: &'a str,
}

#[derive(Serialize)]
struct CreationContext<'a> {
    title: &'a str,
    stdout: &'a [String],
    stderr: Vec<&'a str>,
    outcome: Option<&'a str>,
    outcome_colour: &'a str,
}

#[derive(Serialize)]
struct MessageContext<'a> {
    title: &'a str,
}

/// Render a page template.
///
/// Templates are compiled in, so failures here are bugs. Still, show
/// something rather than take the host down.
fn render<C: serde::Serialize>(template: &'static str, context: &C) -> String {
    let mut tt = TinyTemplate::new();
    let rendered = tt
        .add_template("page", template)
        .and_then(|_| tt.render("page", context));

    match rendered {
        Ok(html) => html,
        Err(e) => {
            warn!("Failed to render wizard page: {}", e);
            "<h1>Internal error</h1>".to_string()
        }
    }
}

/// A page showing just a heading
pub fn message_page(title: &str) -> String {
    render(MESSAGE_TEMPLATE, &MessageContext { title })
}

/// A form page.
///
/// Posting it back yields a submission from `step` holding the carried
/// fields plus whatever was entered into `inputs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPage {
    /// Step id the submission will carry
    pub step: StepId,
    /// Heading
    pub title: String,
    /// Fields from earlier pages, embedded as hidden inputs
    pub carried: FormState,
    /// New inputs on this page
    pub inputs: Vec<Input>,
    /// Submit button caption. No button means the page is a dead end.
    pub button: Option<String>,
}

impl FormPage {
    /// Render to HTML
    pub fn render(&self) -> String {
        let step_id = self.step.as_str();
        let context = FormContext {
            title: &self.title,
            form_name: WIZARD_FORM_NAME,
            step_key: SENDING_STEP_KEY,
            step_id,
            carried: self.carried.carried(),
            inputs: &self.inputs,
            button: self.button.as_deref(),
            next_action: NEXT_PAGE_ACTION,
        };
        render(FORM_TEMPLATE, &context)
    }

    /// The submission a host would post for this page.
    ///
    /// Inputs not mentioned in `entered` keep their initial value.
    pub fn submit<'a, I>(&self, entered: I) -> FormState
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut state = self.carried.clone();
        state.set(SENDING_STEP_KEY, self.step.as_str());
        state.merge(
            self.inputs
                .iter()
                .map(|i| (i.name.clone(), i.value.clone()))
                .collect(),
        );
        state.merge(entered.into_iter().collect());
        state
    }
}

/// Final page of a creation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    /// Rendered final page
    pub html: String,
    /// Whether the cluster was created
    pub result: Errorable<()>,
    /// Everything the wizard collected. Kept on failure too.
    pub fields: FormState,
}

/// A cluster creation in flight.
///
/// Yields a rendered page per update and finally the terminal page.
/// Dropping this does not stop creation: `kind` runs to completion in the
/// background so no half built cluster is left behind.
pub struct Execution {
    settings: ClusterSettings,
    pages: Receiver<ProgressStep<Terminal>>,
}

impl Execution {
    /// Settings the cluster is being created with
    pub fn settings(&self) -> &ClusterSettings {
        &self.settings
    }
}

impl Iterator for Execution {
    type Item = ProgressStep<Terminal>;

    fn next(&mut self) -> Option<Self::Item> {
        // Hangup means the end
        self.pages.recv().ok()
    }
}

/// What the host should show next
pub enum Page {
    /// Another form to fill in
    Form(FormPage),
    /// Creation started
    Executing(Execution),
}

/// Where the wizard ended up after a submission
#[derive(Debug)]
pub enum WizardState {
    /// A form is shown and awaits submission from this step
    AwaitingInput(StepId),
    /// Creation ran to the end, successfully or not
    Terminal(Terminal),
    /// Host was closed mid-creation. Creation carries on regardless.
    Detached,
    /// The submission could not be understood
    Invalid,
}

/// Live state of the creation page
struct CreationPage {
    title: &'static str,
    stdout: Vec<String>,
    stderr: String,
    outcome: Option<&'static str>,
    failed: bool,
}

impl CreationPage {
    fn new() -> Self {
        Self {
            title: CREATING_TITLE,
            stdout: Vec::new(),
            stderr: String::new(),
            outcome: None,
            failed: false,
        }
    }

    fn succeed(&mut self) {
        self.title = "Cluster created";
        self.outcome = Some(
            "Your local cluster has been created. Merge its kubeconfig to start working with it.",
        );
    }

    fn fail(&mut self, stderr: String) {
        self.title = "Cluster creation failed";
        self.stderr = stderr;
        self.outcome = Some("Your local cluster was not created. See tool output above for why.");
        self.failed = true;
    }

    fn render(&self) -> String {
        let context = CreationContext {
            title: self.title,
            stdout: &self.stdout,
            stderr: self.stderr.lines().map(str::trim).collect(),
            outcome: self.outcome,
            outcome_colour: if self.failed { "red" } else { "lightgreen" },
        };
        render(CREATION_TEMPLATE, &context)
    }
}

/// Translate tracked `kind` events into rendered pages
fn stream_creation(
    events: Receiver<ProcessEvent>,
    pages: Sender<ProgressStep<Terminal>>,
    fields: FormState,
) {
    let mut page = CreationPage::new();
    let _ = pages.send(ProgressStep::Update(page.render()));

    for event in events {
        let result = match event {
            ProcessEvent::Line(l) => {
                page.stdout.push(l.trim().to_string());
                let _ = pages.send(ProgressStep::Update(page.render()));
                continue;
            }
            ProcessEvent::Succeeded => {
                page.succeed();
                Ok(())
            }
            ProcessEvent::Failed(stderr) => {
                page.fail(stderr.clone());
                Err(Diagnostics::new(stderr))
            }
        };

        let _ = pages.send(ProgressStep::Complete(Terminal {
            html: page.render(),
            result,
            fields,
        }));
        return;
    }

    debug!("Cluster creation tracker hung up without an outcome");
}

/// Shows reducer progress as wizard pages
struct PageIndicator<'a> {
    host: &'a mut dyn WizardHost,
}

impl ProgressIndicator for PageIndicator<'_> {
    fn begin(&mut self, title: &str) {
        self.host.show_page(&message_page(title));
    }

    fn report(&mut self, html: &str) {
        self.host.show_page(html);
    }

    fn is_dismissed(&self) -> bool {
        self.host.is_closed()
    }

    fn finish(&mut self) {}
}

/// The cluster creation wizard
pub struct Wizard {
    kind: Kind,
}

impl Wizard {
    /// Construct a wizard creating clusters with `kind`
    pub fn new(kind: Kind) -> Self {
        Self { kind }
    }

    /// Page following a submission from `step`
    pub fn next_page(&self, step: StepId, fields: &FormState) -> Page {
        (step.handler())(self, fields)
    }

    fn collect_settings(&self, fields: &FormState) -> Page {
        Page::Form(FormPage {
            step: StepId::Settings,
            title: "Cluster Settings".into(),
            carried: fields.clone(),
            inputs: vec![
                Input {
                    label: "Cluster name".into(),
                    name: CLUSTER_NAME_FIELD.into(),
                    value: DEFAULT_CLUSTER_NAME.into(),
                },
                Input {
                    label: "Image version (blank for default)".into(),
                    name: IMAGE_VERSION_FIELD.into(),
                    value: String::new(),
                },
            ],
            button: Some("Create".into()),
        })
    }

    fn create_cluster(&self, fields: &FormState) -> Page {
        let name = fields
            .get(CLUSTER_NAME_FIELD)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_CLUSTER_NAME);
        let settings = ClusterSettings::new(name, fields.get(IMAGE_VERSION_FIELD));

        let events = self.kind.create_cluster(&settings);
        let (sender, receiver) = channel();
        let fields = fields.clone();
        thread::spawn(move || stream_creation(events, sender, fields));

        Page::Executing(Execution {
            settings,
            pages: receiver,
        })
    }

    /// Handle a form submission from the host.
    ///
    /// Shows a holding page, works out the next page and shows it. For
    /// cluster creation this blocks, streaming pages to `host`, until
    /// creation finishes or the host is closed. `cache` is refreshed once
    /// when a cluster was created.
    pub fn on_next(
        &self,
        host: &mut dyn WizardHost,
        cache: &dyn ClusterCache,
        submission: FormState,
    ) -> WizardState {
        host.show_page(&message_page(PLEASE_WAIT));

        let step = match submission.sending_step().map(StepId::from_str) {
            Some(Ok(s)) => s,
            Some(Err(e)) => {
                warn!("{}", e);
                host.show_page(&message_page("Internal error"));
                return WizardState::Invalid;
            }
            None => {
                warn!("Wizard submission without a sending step");
                host.show_page(&message_page("Internal error"));
                return WizardState::Invalid;
            }
        };
        debug!("Wizard submission from step '{}'", step);

        match self.next_page(step, &submission) {
            Page::Form(form) => {
                host.show_page(&form.render());
                WizardState::AwaitingInput(form.step)
            }
            Page::Executing(execution) => {
                let mut indicator = PageIndicator { host };
                match run_with_progress(&mut indicator, CREATING_TITLE, || execution) {
                    ProgressOutcome::Completed(terminal) => {
                        indicator.host.show_page(&terminal.html);
                        if terminal.result.is_ok() {
                            cache.refresh();
                        }
                        WizardState::Terminal(terminal)
                    }
                    ProgressOutcome::Abandoned => WizardState::Detached,
                    ProgressOutcome::Indeterminate => {
                        let html = message_page("Cluster creation ended without reporting an outcome");
                        indicator.host.show_page(&html);
                        WizardState::Terminal(Terminal {
                            html,
                            result: Err(Diagnostics::new("cluster creation outcome unknown")),
                            fields: submission,
                        })
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KindConfig;
    use crate::tracker::LogCommandLog;
    use rstest::rstest;
    use std::sync::Arc;

    fn wizard() -> Wizard {
        // Creation is never started in these tests
        let config = KindConfig {
            path: "/nonexistent/kind".into(),
            ..Default::default()
        };
        Wizard::new(Kind::new(&config, Arc::new(LogCommandLog)))
    }

    fn settings_form(fields: &FormState) -> FormPage {
        match wizard().next_page(StepId::SelectClusterType, fields) {
            Page::Form(f) => f,
            Page::Executing(_) => panic!("expected a form"),
        }
    }

    #[rstest]
    #[case("select-cluster-type", StepId::SelectClusterType)]
    #[case("settings", StepId::Settings)]
    fn test_step_ids(#[case] raw: &str, #[case] step: StepId) {
        assert_eq!(raw.parse::<StepId>().unwrap(), step);
        assert_eq!(step.as_str(), raw);
    }

    #[test]
    fn test_unknown_step_id() {
        assert!("createCluster".parse::<StepId>().is_err());
    }

    #[test]
    fn test_settings_form() {
        let form = settings_form(&FormState::initial());
        assert_eq!(form.step, StepId::Settings);
        assert_eq!(form.button.as_deref(), Some("Create"));
        let names: Vec<_> = form.inputs.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec![CLUSTER_NAME_FIELD, IMAGE_VERSION_FIELD]);
        assert_eq!(form.inputs[0].value, "kind");
    }

    #[test]
    fn test_form_carries_previous_fields() {
        let mut fields = FormState::initial();
        fields.set("hostcontext", "abc");
        let html = settings_form(&fields).render();

        assert!(html.contains("<input type='hidden' name='hostcontext' value='abc' />"));
        assert!(html.contains(&format!(
            "<input type='hidden' name='{}' value='settings' />",
            SENDING_STEP_KEY
        )));
        // The old step marker is replaced, not carried
        assert!(!html.contains("select-cluster-type"));
        assert!(html.contains(&format!("<form id='{}'>", WIZARD_FORM_NAME)));
        assert!(html.contains("<button onclick='nextPage()'>Create</button>"));
    }

    #[test]
    fn test_form_escapes_values() {
        let mut fields = FormState::initial();
        fields.set("note", "<script>'x'</script>");
        let html = settings_form(&fields).render();
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_submit_only_grows_state() {
        let mut fields = FormState::initial();
        fields.set("hostcontext", "abc");
        fields.set(CLUSTER_NAME_FIELD, "old");
        let submission = settings_form(&fields).submit([(CLUSTER_NAME_FIELD, "new")]);

        assert_eq!(submission.sending_step(), Some("settings"));
        assert_eq!(submission.get("hostcontext"), Some("abc"));
        assert_eq!(submission.get(CLUSTER_NAME_FIELD), Some("new"));
        assert_eq!(submission.get(IMAGE_VERSION_FIELD), Some(""));
        assert!(submission.len() >= fields.len());
    }

    #[test]
    fn test_creation_page_failure() {
        let mut page = CreationPage::new();
        page.stdout.push("Creating cluster".into());
        page.fail("ERROR: node(s) already exist\n".into());
        let html = page.render();
        assert!(html.contains("<h1>Cluster creation failed</h1>"));
        assert!(html.contains("<p>Creating cluster</p>"));
        assert!(html.contains("<p style='color:red'>ERROR: node(s) already exist</p>"));
        assert!(html.contains("color: red"));
    }

    #[test]
    fn test_message_page() {
        assert_eq!(message_page("Please wait...").trim(), "<h1>Please wait...</h1>");
    }
}
