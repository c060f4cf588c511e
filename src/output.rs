use std::fmt;

/// Real time updates about a tracked `kind` process.
///
/// Receivers should expect zero or more `Line` variants followed by
/// exactly one terminal variant (`Succeeded` or `Failed`). Nothing is
/// sent after the terminal variant; the sending side hangs up instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A single line written to stdout, without the trailing newline
    Line(String),
    /// Process exited with status 0
    Succeeded,
    /// Process failed to spawn or exited unsuccessfully.
    ///
    /// Carries the buffered stderr, or a synthesized diagnostic if there
    /// was nothing useful on stderr.
    Failed(String),
}

impl ProcessEvent {
    /// Whether this is the last event of a tracked process
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessEvent::Line(_))
    }
}

/// A single step reported by a long running operation.
///
/// Producers emit zero or more `Update`s followed by exactly one
/// `Complete`. Consumers stop reading after `Complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressStep<T> {
    /// Human readable progress message
    Update(String),
    /// Operation finished with the provided value
    Complete(T),
}

/// Non-empty list of human readable error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    first: String,
    rest: Vec<String>,
}

impl Diagnostics {
    /// Construct from a single message
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            first: message.into(),
            rest: Vec::new(),
        }
    }

    /// Append another message
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.rest.push(message.into());
    }

    /// The primary message. This is what gets shown to the user.
    pub fn first(&self) -> &str {
        &self.first
    }

    /// All messages, primary first
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.first.as_str()).chain(self.rest.iter().map(String::as_str))
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)
    }
}

impl std::error::Error for Diagnostics {}

/// Result of an operation whose failures are expected and user facing
pub type Errorable<T> = Result<T, Diagnostics>;

/// Result of an interactive prompt the user may abandon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cancellable<T> {
    /// User backed out
    Cancelled,
    /// User provided a value
    Value(T),
}

impl<T> From<Option<T>> for Cancellable<T> {
    fn from(o: Option<T>) -> Self {
        match o {
            Some(v) => Cancellable::Value(v),
            None => Cancellable::Cancelled,
        }
    }
}
