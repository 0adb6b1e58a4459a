//! Identifier newtypes.
//!
//! Widget and item identifiers are derived from BLAKE3 digests of their
//! creation inputs, so the same inputs always yield the same identifier.
//! That property lets a client reconciler predict the id of an item it
//! appends optimistically.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix for widget identifiers.
pub const WIDGET_ID_PREFIX: &str = "wd-";

/// Prefix for item identifiers inside a widget payload.
pub const ITEM_ID_PREFIX: &str = "it-";

/// Number of hex characters kept from the digest.
const DIGEST_HEX_LEN: usize = 12;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw string without validation.
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the raw string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Stable identifier of one widget document.
    WidgetId
);

string_id!(
    /// Identifier of an entry inside a widget payload (idea, card, task).
    ItemId
);

string_id!(
    /// Authenticated participant identity, supplied by the session layer.
    ActorId
);

string_id!(
    /// Broadcast scope: one channel per parent conversation.
    ChannelKey
);

impl WidgetId {
    /// Derive a widget id from the creation inputs.
    #[must_use]
    pub fn derive(channel: &ChannelKey, creator: &ActorId, kind: &str, nonce: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(channel.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(creator.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(kind.as_bytes());
        hasher.update(&nonce.to_le_bytes());
        Self(format!("{WIDGET_ID_PREFIX}{}", short_hex(&hasher.finalize())))
    }
}

impl ItemId {
    /// Derive an item id from the widget, the version the item is added at,
    /// its author and its text.
    #[must_use]
    pub fn derive(widget: &WidgetId, version: u64, author: &ActorId, text: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(widget.as_str().as_bytes());
        hasher.update(&version.to_le_bytes());
        hasher.update(author.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(text.as_bytes());
        Self(format!("{ITEM_ID_PREFIX}{}", short_hex(&hasher.finalize())))
    }
}

fn short_hex(hash: &blake3::Hash) -> String {
    let mut hex = hash.to_hex().to_string();
    hex.truncate(DIGEST_HEX_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widget_id_is_deterministic_and_prefixed() {
        let channel = ChannelKey::from("conv-1");
        let creator = ActorId::from("u1");
        let a = WidgetId::derive(&channel, &creator, "poll", 7);
        let b = WidgetId::derive(&channel, &creator, "poll", 7);
        assert_eq!(a, b);
        assert!(a.as_str().starts_with(WIDGET_ID_PREFIX));
        assert_eq!(a.as_str().len(), WIDGET_ID_PREFIX.len() + DIGEST_HEX_LEN);
    }

    #[test]
    fn widget_id_changes_with_nonce() {
        let channel = ChannelKey::from("conv-1");
        let creator = ActorId::from("u1");
        assert_ne!(
            WidgetId::derive(&channel, &creator, "poll", 1),
            WidgetId::derive(&channel, &creator, "poll", 2)
        );
    }

    #[test]
    fn item_id_depends_on_version_and_text() {
        let widget = WidgetId::from("wd-abc");
        let author = ActorId::from("u2");
        let base = ItemId::derive(&widget, 3, &author, "idea");
        assert_eq!(base, ItemId::derive(&widget, 3, &author, "idea"));
        assert_ne!(base, ItemId::derive(&widget, 4, &author, "idea"));
        assert_ne!(base, ItemId::derive(&widget, 3, &author, "other"));
        assert!(base.as_str().starts_with(ITEM_ID_PREFIX));
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = ActorId::from("u9");
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "\"u9\"");
    }
}
