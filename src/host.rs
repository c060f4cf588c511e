use crate::kind::ClusterSettings;
use crate::output::Cancellable;

/// A visible progress indicator for one long running operation.
pub trait ProgressIndicator {
    /// Show the indicator labelled with `title`
    fn begin(&mut self, title: &str);
    /// Replace the displayed progress message
    fn report(&mut self, message: &str);
    /// Whether the user has dismissed the indicator.
    ///
    /// Dismissing only stops the display. Whatever produces the progress
    /// keeps running.
    fn is_dismissed(&self) -> bool {
        false
    }
    /// Tear the indicator down
    fn finish(&mut self);
}

/// One-line user facing notifications
pub trait Notifier {
    /// Report success
    fn info(&self, message: &str);
    /// Report failure
    fn error(&self, message: &str);
}

/// Interactive questions asked of the user
pub trait Prompter {
    /// Ask for the settings of a new cluster
    fn cluster_settings(&self) -> Cancellable<ClusterSettings>;
    /// Ask the user to confirm a destructive action
    fn confirm(&self, text: &str, confirm_label: &str) -> bool;
    /// Pick one cluster out of `names`
    fn pick_cluster(&self, names: &[String]) -> Cancellable<String>;
    /// Free text fallback when clusters can't be listed
    fn cluster_name(&self, prompt: &str) -> Cancellable<String>;
}

/// Displays wizard pages (eg. a webview)
pub trait WizardHost {
    /// Replace the displayed page
    fn show_page(&mut self, html: &str);
    /// Whether the user closed the wizard
    fn is_closed(&self) -> bool {
        false
    }
}

/// Whatever caches the cluster list (eg. a tree view).
pub trait ClusterCache {
    /// The cluster list changed and should be reloaded
    fn refresh(&self);
}
