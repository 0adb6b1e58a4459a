//! SQLite schema for persisted widget documents.
//!
//! - `widgets` keeps the latest document per widget as JSON, with the
//!   columns the store filters on (`channel`, `kind`, `version`, `closed`)
//!   lifted out
//! - `store_meta` records the applied schema version

/// Migration v1: document table plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS widgets (
    widget_id TEXT PRIMARY KEY,
    channel TEXT NOT NULL CHECK (length(trim(channel)) > 0),
    kind TEXT NOT NULL,
    version INTEGER NOT NULL CHECK (version >= 0),
    closed INTEGER NOT NULL DEFAULT 0 CHECK (closed IN (0, 1)),
    document_json TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    CHECK (widget_id LIKE 'wd-%')
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 0);
";

/// Migration v2: indexes for channel listing and open-widget scans.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_widgets_channel_created
    ON widgets(channel, created_at_us, widget_id);

CREATE INDEX IF NOT EXISTS idx_widgets_open_kind
    ON widgets(kind, closed);
";

/// Indexes that must exist after all migrations.
pub const REQUIRED_INDEXES: &[&str] = &["idx_widgets_channel_created", "idx_widgets_open_kind"];
