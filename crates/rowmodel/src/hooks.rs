//! Lifecycle hook registry.
//!
//! Handlers are registered per `(Timing, HookEvent)` pair while a table is
//! being built and are immutable afterwards. A chain is dispatched all at
//! once: every handler of the pair runs concurrently, the first failure to
//! surface aborts the chain, and on success each handler's attribute patch is
//! returned in registration order.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use asupersync::Outcome;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use rowmodel_core::{Attributes, Error};

/// When a hook runs relative to its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timing {
    /// Before the event's write.
    Before,
    /// After the event's write.
    After,
}

impl Timing {
    /// Lowercase name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Timing::Before => "before",
            Timing::After => "after",
        }
    }
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle events a hook can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Attribute validation.
    Validate,
    /// Insert of a new record.
    Save,
    /// Update of a persisted record.
    Update,
    /// Read-then-write upsert.
    Upsert,
    /// Delete of a persisted record.
    Destroy,
}

impl HookEvent {
    /// Lowercase name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            HookEvent::Validate => "validate",
            HookEvent::Save => "save",
            HookEvent::Update => "update",
            HookEvent::Upsert => "upsert",
            HookEvent::Destroy => "destroy",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the record a hook runs for.
#[derive(Debug, Clone, PartialEq)]
pub struct HookContext {
    /// Table name.
    pub table: String,
    /// Event being dispatched.
    pub event: HookEvent,
    /// Timing being dispatched.
    pub timing: Timing,
    /// Whether the record has not been persisted yet.
    pub is_new: bool,
    /// The record's attributes at dispatch time.
    pub attributes: Attributes,
}

/// Pending result of one handler: an attribute patch to merge into the record.
pub type HookFuture = BoxFuture<'static, Outcome<Attributes, Error>>;

/// A registered hook handler.
pub type HookHandler = Arc<dyn Fn(HookContext) -> HookFuture + Send + Sync>;

/// Wrap an async closure as a [`HookHandler`].
pub fn handler<F, Fut>(f: F) -> HookHandler
where
    F: Fn(HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome<Attributes, Error>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

/// Ordered handler lists keyed by `(Timing, HookEvent)`.
#[derive(Clone, Default)]
pub struct HookRegistry {
    handlers: HashMap<(Timing, HookEvent), Vec<HookHandler>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<_> = self
            .handlers
            .iter()
            .map(|((timing, event), list)| (format!("{timing}-{event}"), list.len()))
            .collect();
        counts.sort();
        f.debug_struct("HookRegistry")
            .field("handlers", &counts)
            .finish()
    }
}

impl HookRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the `(timing, event)` list.
    pub fn register(&mut self, timing: Timing, event: HookEvent, handler: HookHandler) {
        self.handlers
            .entry((timing, event))
            .or_default()
            .push(handler);
    }

    /// Handlers registered for `(timing, event)`, in registration order.
    pub fn handlers(&self, timing: Timing, event: HookEvent) -> &[HookHandler] {
        self.handlers
            .get(&(timing, event))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of handlers registered for `(timing, event)`.
    pub fn len(&self, timing: Timing, event: HookEvent) -> usize {
        self.handlers(timing, event).len()
    }

    /// Whether no handler is registered at all.
    pub fn is_empty(&self) -> bool {
        self.handlers.values().all(Vec::is_empty)
    }

    /// One pending operation per handler of `(timing, event)`, each invoked
    /// with its own copy of `ctx`. Nothing runs until the futures are polled.
    pub fn generate(&self, timing: Timing, event: HookEvent, ctx: &HookContext) -> Vec<HookFuture> {
        self.handlers(timing, event)
            .iter()
            .map(|handler| handler(ctx.clone()))
            .collect()
    }
}

/// Drive every pending hook concurrently.
///
/// Resolves with the patches in the order the futures were given once all of
/// them succeed. The first failure to surface is returned immediately and the
/// remaining futures are dropped.
pub async fn run_all(hooks: Vec<HookFuture>) -> Outcome<Vec<Attributes>, Error> {
    let total = hooks.len();
    let mut pending: FuturesUnordered<_> = hooks
        .into_iter()
        .enumerate()
        .map(|(index, hook)| async move { (index, hook.await) })
        .collect();

    let mut patches: Vec<Option<Attributes>> = vec![None; total];
    while let Some((index, outcome)) = pending.next().await {
        match outcome {
            Outcome::Ok(patch) => patches[index] = Some(patch),
            Outcome::Err(e) => {
                tracing::debug!(hook = index, error = %e, "Hook failed, aborting chain");
                return Outcome::Err(e);
            }
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    }

    Outcome::Ok(patches.into_iter().flatten().collect())
}
