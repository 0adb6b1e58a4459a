//! Widget data model: documents, payloads, operations and identifiers.

pub mod document;
pub mod ids;
pub mod kind;
pub mod operation;
pub mod payload;
pub mod setup;

pub use document::{Actor, Role, WidgetDocument};
pub use ids::{ActorId, ChannelKey, ItemId, WidgetId};
pub use kind::{PayloadShape, UnknownWidgetKind, WidgetKind};
pub use operation::{Choice, ItemAttrs, Operation, OperationKind};
pub use payload::Payload;
pub use setup::Setup;
