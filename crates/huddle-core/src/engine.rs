//! Server-side orchestration.
//!
//! For each request: run the processor inside the store's atomic update,
//! publish the committed document to the widget's channel, return it.
//! Anything handed to a participant ([`Engine::handle`], [`Engine::fetch`])
//! is redacted for that participant first.
//! Publication happens inside the store's critical section, so every
//! subscriber sees versions of one widget in commit order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::aggregate;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{EngineError, Rejection, StoreError};
use crate::model::{Actor, ChannelKey, Operation, Setup, WidgetDocument, WidgetId, WidgetKind};
use crate::notify::Notifier;
use crate::processor::{self, ApplyContext};
use crate::protocol::{OperationRequest, OperationResponse};
use crate::guard::LifecycleState;
use crate::registry;
use crate::store::WidgetStore;
use crate::view::redact_for;

/// Attempts at finding a free widget id before giving up.
const CREATE_ATTEMPTS: u32 = 3;

/// Parameters of a new widget, as issued by a slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub channel: ChannelKey,
    pub kind: WidgetKind,
    pub actor: Actor,
    pub setup: Setup,
}

/// The widget engine: processor, store and notifier wired together.
pub struct Engine<S, N> {
    store: S,
    notifier: N,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    nonce: AtomicU64,
}

impl<S: WidgetStore, N: Notifier> Engine<S, N> {
    #[must_use]
    pub fn new(store: S, notifier: N, config: EngineConfig) -> Self {
        Self {
            store,
            notifier,
            config,
            clock: Arc::new(SystemClock),
            nonce: AtomicU64::new(0),
        }
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create and store a new widget at version 0, then broadcast it.
    ///
    /// # Errors
    ///
    /// [`Rejection::InvalidArgument`] for a setup that does not fit the kind,
    /// or a store failure.
    pub fn create(&self, request: &CreateRequest) -> Result<WidgetDocument, EngineError> {
        let schema = registry::schema(request.kind);
        let payload = registry::initial_payload(request.kind, &request.setup, &self.config.limits)
            .inspect_err(|rejection| {
                tracing::warn!(
                    kind = %request.kind,
                    channel = %request.channel,
                    error = %rejection,
                    "widget setup rejected"
                );
            })?;
        let revealed = schema.hides_votes.then_some(false);
        let now = self.clock.now();

        let mut document = WidgetDocument {
            id: WidgetId::new(String::new()),
            kind: request.kind,
            channel: request.channel.clone(),
            created_by: request.actor.id.clone(),
            created_at: now,
            closed: false,
            revealed,
            version: 0,
            summary: aggregate::summarize(request.kind, &payload, matches!(revealed, Some(false))),
            payload,
        };

        let seed = u64::try_from(now.timestamp_micros()).unwrap_or_default();
        let mut attempt = 0;
        loop {
            let nonce = seed.wrapping_add(self.nonce.fetch_add(1, Ordering::Relaxed));
            document.id = WidgetId::derive(
                &request.channel,
                &request.actor.id,
                request.kind.as_str(),
                nonce,
            );
            match self.store.insert(&document) {
                Ok(()) => break,
                Err(StoreError::AlreadyExists(id)) if attempt + 1 < CREATE_ATTEMPTS => {
                    tracing::debug!(widget = %id, attempt, "widget id taken, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }

        let delivered = self.notifier.publish(&document.channel, &document);
        tracing::info!(
            widget = %document.id,
            kind = %document.kind,
            channel = %document.channel,
            creator = %document.created_by,
            delivered,
            "widget created"
        );
        Ok(document)
    }

    /// Apply one operation and broadcast the result.
    ///
    /// # Errors
    ///
    /// The [`Rejection`] from the processor, [`Rejection::NotFound`] for an
    /// unknown widget, or a store failure. Nothing is written or broadcast
    /// on error.
    pub fn apply(
        &self,
        widget_id: &WidgetId,
        operation: &Operation,
        actor: &Actor,
    ) -> Result<WidgetDocument, EngineError> {
        let ctx = ApplyContext::new(self.clock.now(), &self.config.limits);
        let mut delivered = 0;
        let result = self.store.atomic_update(
            widget_id,
            &mut |current| processor::apply(current, operation, actor, &ctx),
            &mut |committed| delivered = self.notifier.publish(&committed.channel, committed),
        );

        match &result {
            Ok(document) => {
                if document.closed && matches!(operation, Operation::Close) {
                    tracing::info!(
                        widget = %widget_id,
                        actor = %actor.id,
                        version = document.version,
                        "widget closed"
                    );
                } else {
                    tracing::debug!(
                        widget = %widget_id,
                        op = %operation.kind(),
                        actor = %actor.id,
                        version = document.version,
                        state = %LifecycleState::of(document),
                        delivered,
                        "operation accepted"
                    );
                }
            }
            Err(EngineError::Rejected(rejection @ Rejection::InvalidArgument(_))) => {
                tracing::warn!(
                    widget = %widget_id,
                    op = %operation.kind(),
                    actor = %actor.id,
                    error = %rejection,
                    "operation rejected"
                );
            }
            Err(EngineError::Rejected(rejection)) => {
                tracing::debug!(
                    widget = %widget_id,
                    op = %operation.kind(),
                    actor = %actor.id,
                    code = %rejection.code(),
                    "operation rejected"
                );
            }
            Err(EngineError::Store(err)) => {
                tracing::error!(
                    widget = %widget_id,
                    op = %operation.kind(),
                    code = %err.code(),
                    error = %err,
                    "widget store failure"
                );
            }
        }

        result
    }

    /// Wire entry point: one request in, one response out. The returned
    /// document is the requester's view of the commit.
    #[must_use]
    pub fn handle(&self, request: &OperationRequest) -> OperationResponse {
        self.apply(&request.widget_id, &request.operation, &request.actor)
            .map(|document| redact_for(&document, &request.actor.id))
            .into()
    }

    /// Latest stored version of a widget.
    ///
    /// # Errors
    ///
    /// [`Rejection::NotFound`] for an unknown id, or a store failure.
    pub fn get(&self, widget_id: &WidgetId) -> Result<WidgetDocument, EngineError> {
        self.store
            .load(widget_id)?
            .ok_or_else(|| Rejection::NotFound(widget_id.to_string()).into())
    }

    /// Latest stored version as `viewer` may see it.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::get`].
    pub fn fetch(
        &self,
        widget_id: &WidgetId,
        viewer: &Actor,
    ) -> Result<WidgetDocument, EngineError> {
        self.get(widget_id).map(|document| redact_for(&document, &viewer.id))
    }

    /// All widgets of a conversation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub fn list(&self, channel: &ChannelKey) -> Result<Vec<WidgetDocument>, EngineError> {
        Ok(self.store.list_channel(channel)?)
    }
}
