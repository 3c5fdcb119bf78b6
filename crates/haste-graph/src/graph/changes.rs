//! Serialized application of watcher events.
//!
//! One task owns every mutation after the initial load. Events are applied
//! in arrival order; a barrier command drains whatever is queued before it
//! answers, which gives callers read-your-writes.

use path_clean::PathClean;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::context::GraphContext;
use crate::error::GraphError;
use crate::haste_map::{self, HasteMap};
use crate::helpers::PACKAGE_JSON;
use crate::watch::{ChangeKind, WatchEvent};

#[derive(Debug)]
pub(crate) enum Command {
    /// Answer once every event queued so far has been applied.
    Barrier(oneshot::Sender<()>),
}

/// Last global-map failure. While set, the next change rebuilds the whole
/// map instead of patching it.
pub(crate) type HasteFailure = Arc<Mutex<Option<GraphError>>>;

pub(crate) async fn apply_loop(
    ctx: Arc<GraphContext>,
    mut events: Option<mpsc::UnboundedReceiver<WatchEvent>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    failure: HasteFailure,
) {
    loop {
        tokio::select! {
            biased;

            event = async {
                match events.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => match event {
                Some(event) => apply_event(&ctx, &failure, event).await,
                None => {
                    tracing::debug!("watcher closed, no further changes will be applied");
                    events = None;
                }
            },

            command = commands.recv() => match command {
                Some(Command::Barrier(done)) => {
                    if let Some(rx) = events.as_mut() {
                        while let Ok(event) = rx.try_recv() {
                            apply_event(&ctx, &failure, event).await;
                        }
                    }
                    let _ = done.send(());
                }
                None => break,
            },
        }
    }

    tracing::debug!("change loop stopped");
}

async fn apply_event(ctx: &GraphContext, failure: &HasteFailure, event: WatchEvent) {
    let path = event.absolute_path().clean();

    // A deleted directory takes every file below it along.
    let affected: Vec<PathBuf> = if event.kind == ChangeKind::Delete && ctx.tree.dir_exists(&path) {
        ctx.tree
            .all_files()
            .into_iter()
            .filter(|file| file.starts_with(&path))
            .collect()
    } else if event.is_dir() || !ctx.is_tracked(&path) {
        tracing::trace!(path = %path.display(), "ignoring change");
        return;
    } else {
        vec![path.clone()]
    };

    let known = ctx.tree.file_exists(&path);
    if !ctx.tree.apply_change(event.kind, &path) {
        return;
    }

    tracing::debug!(kind = ?event.kind, path = %path.display(), files = affected.len(), "applying change");

    // Set when a cached edge may now resolve to a different module
    let mut edges_stale = event.kind == ChangeKind::Add || (event.kind == ChangeKind::Change && !known);

    for file in &affected {
        ctx.cache.invalidate(file);
        ctx.modules.process_file_change(event.kind, file);
        ctx.assets.process_file_change(event.kind, file);

        if is_manifest(file) {
            edges_stale = true;
            invalidate_package_members(ctx, file);
        }
    }

    let previous = failure.lock().take();
    if let Some(previous) = previous {
        tracing::info!(error = %previous, "rebuilding global module map after earlier failure");
        match HasteMap::build(ctx).await {
            Ok(map) => *ctx.haste.write() = map,
            Err(e) => record_failure(failure, e),
        }
        clear_edges(ctx);
        return;
    }

    for file in &affected {
        match haste_map::process_file_change(ctx, event.kind, file).await {
            Ok(names_changed) => edges_stale |= names_changed,
            Err(e) => {
                record_failure(failure, e);
                edges_stale = true;
                break;
            }
        }
    }

    if edges_stale {
        clear_edges(ctx);
    }
}

fn is_manifest(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == PACKAGE_JSON)
}

/// Facts such as a module's name depend on its package manifest.
fn invalidate_package_members(ctx: &GraphContext, manifest: &Path) {
    let Some(root) = manifest.parent() else {
        return;
    };
    let mut count = 0;
    for file in ctx.tree.all_files() {
        if file.starts_with(root) && file != manifest {
            ctx.cache.invalidate(&file);
            count += 1;
        }
    }
    tracing::debug!(package = %root.display(), files = count, "invalidated facts of package members");
}

fn clear_edges(ctx: &GraphContext) {
    let dropped = ctx.modules.clear_edges();
    tracing::debug!(edges = dropped, "dropped cached resolutions");
}

fn record_failure(failure: &HasteFailure, error: GraphError) {
    tracing::warn!(error = %error, "global module map is out of date until the next change");
    *failure.lock() = Some(error);
}
