//! huddle-core library.
//!
//! Collaborative widgets for a meeting chat: polls, boards, task lists,
//! scales, rankings and multi-round brainwriting. Each widget is one
//! [`WidgetDocument`]; every accepted [`Operation`] produces the next
//! version, which is stored atomically and broadcast whole to the
//! conversation's channel.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums in the library ([`Rejection`],
//!   [`StoreError`], [`EngineError`]), `anyhow::Result` at the config and
//!   store-opening edges.
//! - **Logging**: `tracing` macros with structured fields (`widget`, `op`,
//!   `actor`, `version`).

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod model;
pub mod notify;
pub mod processor;
pub mod protocol;
pub mod reconcile;
pub mod registry;
pub mod store;
pub mod view;

pub use aggregate::Summary;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, LimitsConfig, StoreConfig, load_config};
pub use engine::{CreateRequest, Engine};
pub use error::{EngineError, ErrorCode, Rejection, RejectionKind, StoreError};
pub use model::{
    Actor, ActorId, ChannelKey, Choice, ItemAttrs, ItemId, Operation, OperationKind, Payload,
    Role, Setup, WidgetDocument, WidgetId, WidgetKind,
};
pub use notify::{Broadcast, ChannelHub, Notifier, NullNotifier, Subscription};
pub use processor::{ApplyContext, apply};
pub use protocol::{OperationRequest, OperationResponse};
pub use reconcile::{Receipt, Reconciler, Ticket};
pub use store::{MemoryStore, SqliteStore, WidgetStore};
