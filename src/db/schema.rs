/// Tables for local state. Only the auth session is kept on disk.
pub const SCHEMA: &str = r#"
-- Single-row table holding the serialized session
CREATE TABLE IF NOT EXISTS session (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    data TEXT NOT NULL,
    saved_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
