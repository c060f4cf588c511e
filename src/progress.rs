use log::{debug, warn};

use crate::host::ProgressIndicator;
use crate::output::{Diagnostics, Errorable, ProcessEvent, ProgressStep};

/// Marker `kind` prefixes its interesting status lines with
pub const DEFAULT_MARKER: &str = "•";

/// How a long running operation ended, as far as the consumer saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressOutcome<T> {
    /// Producer completed with the provided value
    Completed(T),
    /// User dismissed the indicator before completion.
    ///
    /// The producer keeps running in the background.
    Abandoned,
    /// Producer ended without ever completing. This is always a producer bug.
    Indeterminate,
}

/// Adapt tracked process events into progress steps.
///
/// Every stdout line becomes an update. The terminal event becomes the
/// completion, carrying stderr as the diagnostic on failure.
pub fn steps_from_process<I>(events: I) -> impl Iterator<Item = ProgressStep<Errorable<()>>>
where
    I: IntoIterator<Item = ProcessEvent>,
{
    events.into_iter().map(|event| match event {
        ProcessEvent::Line(l) => ProgressStep::Update(l),
        ProcessEvent::Succeeded => ProgressStep::Complete(Ok(())),
        ProcessEvent::Failed(stderr) => ProgressStep::Complete(Err(Diagnostics::new(stderr))),
    })
}

/// Drop updates `predicate` rejects and rewrite the rest with `transform`.
///
/// `Complete` steps always pass through untouched.
pub fn filter_decorate<T, I, P, F>(
    steps: I,
    predicate: P,
    transform: F,
) -> impl Iterator<Item = ProgressStep<T>>
where
    I: IntoIterator<Item = ProgressStep<T>>,
    P: Fn(&str) -> bool,
    F: Fn(&str) -> String,
{
    steps.into_iter().filter_map(move |step| match step {
        ProgressStep::Update(m) if predicate(&m) => Some(ProgressStep::Update(transform(&m))),
        ProgressStep::Update(m) => {
            debug!("Dropping uninteresting progress: {}", m);
            None
        }
        complete => Some(complete),
    })
}

/// Keep only updates that start with `marker`, with the marker stripped
pub fn interesting_only<'a, T, I>(
    steps: I,
    marker: &'a str,
) -> impl Iterator<Item = ProgressStep<T>> + 'a
where
    I: IntoIterator<Item = ProgressStep<T>> + 'a,
    T: 'a,
{
    filter_decorate(
        steps,
        move |l| l.trim_start().starts_with(marker),
        move |l| {
            let l = l.trim_start();
            l.strip_prefix(marker).unwrap_or(l).trim().to_string()
        },
    )
}

/// Consume `producer`'s steps while driving `indicator`.
///
/// Returns the value of the first `Complete`. Anything the producer emits
/// afterwards is never read. The indicator is finished on every path.
pub fn run_with_progress<T, I, F>(
    indicator: &mut dyn ProgressIndicator,
    title: &str,
    producer: F,
) -> ProgressOutcome<T>
where
    F: FnOnce() -> I,
    I: IntoIterator<Item = ProgressStep<T>>,
{
    indicator.begin(title);
    let mut indicator = scopeguard::guard(indicator, |i| i.finish());

    for step in producer() {
        let message = match step {
            // A result already in hand always resolves, dismissed or not
            ProgressStep::Complete(v) => return ProgressOutcome::Completed(v),
            ProgressStep::Update(m) => m,
        };

        if indicator.is_dismissed() {
            debug!("Progress for '{}' dismissed; leaving it running", title);
            return ProgressOutcome::Abandoned;
        }
        indicator.report(&message);
    }

    warn!("Progress for '{}' ended without completing", title);
    ProgressOutcome::Indeterminate
}
