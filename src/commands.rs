use std::iter;
use std::sync::mpsc::Receiver;

use anyhow::Result;
use log::{debug, info};
use regex::Regex;

use crate::config::{Config, CreatePolicy};
use crate::document::{with_cluster_spec, ActiveDocument, ClusterSpecDocument};
use crate::host::{ClusterCache, Notifier, ProgressIndicator, Prompter};
use crate::kind::Kind;
use crate::output::{Cancellable, Errorable, ProcessEvent, ProgressStep};
use crate::progress::{interesting_only, run_with_progress, steps_from_process, ProgressOutcome};

const CREATING_TITLE: &str = "Creating Kind cluster...";

/// Where a command was launched from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A cluster tree node's context menu
    ClusterTree,
    /// The command palette, or anything else without a target
    Palette,
}

/// Everything a command needs to talk to `kind` and the user
pub struct Context<'a> {
    /// `kind` client
    pub kind: &'a Kind,
    /// Loaded configuration
    pub config: &'a Config,
    /// Progress display
    pub indicator: &'a mut dyn ProgressIndicator,
    /// User notifications
    pub notifier: &'a dyn Notifier,
    /// User prompts
    pub prompter: &'a dyn Prompter,
    /// Cluster list cache to refresh after changes
    pub cache: &'a dyn ClusterCache,
}

/// Progress steps for a tracked `kind` process, noise filtered out
fn tracked_progress(
    events: Receiver<ProcessEvent>,
    marker: &str,
) -> impl Iterator<Item = ProgressStep<Errorable<()>>> + '_ {
    interesting_only(steps_from_process(events), marker)
}

/// Tell the user how creation went. Returns whether a cluster was created.
fn display_creation_result(ctx: &Context, outcome: ProgressOutcome<Errorable<()>>) -> bool {
    match outcome {
        ProgressOutcome::Completed(Ok(())) => {
            ctx.notifier.info("Created Kind cluster");
            ctx.cache.refresh();
            return true;
        }
        ProgressOutcome::Completed(Err(e)) => {
            ctx.notifier
                .error(&format!("Creating Kind cluster failed: {}", e.first()));
        }
        ProgressOutcome::Abandoned => {
            info!("No longer following cluster creation; it continues in the background")
        }
        ProgressOutcome::Indeterminate => ctx
            .notifier
            .error("Creating Kind cluster failed: kind did not report an outcome"),
    }

    false
}

fn display_deletion_result(
    ctx: &Context,
    outcome: ProgressOutcome<Errorable<()>>,
    name: &str,
) -> bool {
    match outcome {
        ProgressOutcome::Completed(Ok(())) => {
            ctx.notifier.info(&format!("Deleted cluster {}", name));
            ctx.cache.refresh();
            return true;
        }
        ProgressOutcome::Completed(Err(e)) => {
            ctx.notifier
                .error(&format!("Deleting Kind cluster failed: {}", e.first()));
        }
        ProgressOutcome::Abandoned => {
            info!("No longer following deletion of {}; it continues in the background", name)
        }
        ProgressOutcome::Indeterminate => ctx
            .notifier
            .error("Deleting Kind cluster failed: kind did not report an outcome"),
    }

    false
}

fn create_cluster_interactive(ctx: &mut Context) -> bool {
    let settings = match ctx.prompter.cluster_settings() {
        Cancellable::Value(s) => s,
        Cancellable::Cancelled => {
            debug!("Cluster creation cancelled");
            return false;
        }
    };

    let kind = ctx.kind;
    let marker = ctx.config.progress.marker.as_str();
    let outcome = run_with_progress(ctx.indicator, CREATING_TITLE, || {
        tracked_progress(kind.create_cluster(&settings), marker)
    });
    display_creation_result(ctx, outcome)
}

fn create_cluster_from_spec(ctx: &mut Context, spec: &ClusterSpecDocument) -> Result<bool> {
    let kind = ctx.kind;
    let marker = ctx.config.progress.marker.as_str();
    let indicator = &mut *ctx.indicator;
    let outcome = with_cluster_spec(spec, |path| {
        run_with_progress(indicator, CREATING_TITLE, || {
            tracked_progress(kind.create_cluster_from_config(path), marker)
        })
    })?;

    Ok(display_creation_result(ctx, outcome))
}

/// Create a cluster.
///
/// Launched from the cluster tree this always prompts for settings.
/// Otherwise, under [`CreatePolicy::ActiveDocument`], an active document
/// holding a Kind cluster config is used instead of prompting.
///
/// Returns whether a cluster was created. Only failing to stage an unsaved
/// document is an error. Everything else is reported through `ctx`.
pub fn create_cluster(
    ctx: &mut Context,
    origin: Origin,
    active: Option<&ActiveDocument>,
) -> Result<bool> {
    let use_document =
        origin == Origin::Palette && ctx.config.create.policy == CreatePolicy::ActiveDocument;
    if use_document {
        if let Some(spec) = active.and_then(ActiveDocument::as_cluster_spec) {
            return create_cluster_from_spec(ctx, &spec);
        }
    }

    Ok(create_cluster_interactive(ctx))
}

/// Ask which cluster to delete
fn prompt_cluster(ctx: &mut Context) -> Cancellable<String> {
    let kind = ctx.kind;
    let clusters = run_with_progress(ctx.indicator, "Getting existing clusters...", || {
        iter::once_with(|| ProgressStep::Complete(kind.get_clusters()))
    });

    match clusters {
        ProgressOutcome::Completed(Ok(clusters)) if clusters.is_empty() => {
            ctx.notifier.info("No Kind clusters found");
            Cancellable::Cancelled
        }
        ProgressOutcome::Completed(Ok(clusters)) => {
            let names: Vec<String> = clusters.into_iter().map(|c| c.name).collect();
            ctx.prompter.pick_cluster(&names)
        }
        ProgressOutcome::Completed(Err(e)) => {
            debug!("Failed to list clusters: {}", e);
            ctx.prompter.cluster_name("Cluster to delete")
        }
        _ => ctx.prompter.cluster_name("Cluster to delete"),
    }
}

fn delete_cluster_by_name(ctx: &mut Context, name: &str) -> bool {
    let confirmed = ctx.prompter.confirm(
        &format!("This will delete {}. You will not be able to undo this.", name),
        "Delete Cluster",
    );
    if !confirmed {
        debug!("Deletion of {} not confirmed", name);
        return false;
    }

    let kind = ctx.kind;
    let marker = ctx.config.progress.marker.as_str();
    let title = format!("Deleting cluster {}...", name);
    let outcome = run_with_progress(ctx.indicator, &title, || {
        tracked_progress(kind.delete_cluster(name), marker)
    });
    display_deletion_result(ctx, outcome, name)
}

/// Delete a cluster.
///
/// `target` names the cluster when launched from a cluster tree node.
/// Otherwise the user picks one. Returns whether the cluster was deleted.
pub fn delete_cluster(ctx: &mut Context, target: Option<&str>) -> bool {
    let name = match target {
        Some(n) => n.to_string(),
        None => match prompt_cluster(ctx) {
            Cancellable::Value(n) => n,
            Cancellable::Cancelled => {
                debug!("Cluster deletion cancelled");
                return false;
            }
        },
    };

    delete_cluster_by_name(ctx, &name)
}

/// Names of clusters matching `filter`
pub fn list_clusters(kind: &Kind, filter: &Regex) -> Errorable<Vec<String>> {
    let clusters = kind.get_clusters()?;
    Ok(clusters
        .into_iter()
        .map(|c| c.name)
        .filter(|n| filter.is_match(n))
        .collect())
}
