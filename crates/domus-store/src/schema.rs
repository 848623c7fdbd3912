//! Database schema SQL.

/// Matters, documents, scan history and risk findings.
///
/// Timestamps are milliseconds since the Unix epoch. Findings reference the
/// scan that produced them; a matter's current findings are those of its
/// latest scan.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS matters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ref TEXT NOT NULL UNIQUE,
    council TEXT,
    uprn TEXT,
    title_number TEXT,
    address_text TEXT,
    postcode TEXT,
    status TEXT NOT NULL DEFAULT 'received',
    created_at INTEGER NOT NULL,
    approved_at INTEGER,
    first_scan_at INTEGER
);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    matter_id INTEGER NOT NULL REFERENCES matters(id),
    kind TEXT NOT NULL,
    filename TEXT NOT NULL,
    content_type TEXT,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    storage_pointer TEXT NOT NULL,
    ocr_text TEXT,
    ocr_applied INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_matter ON documents(matter_id);

CREATE TABLE IF NOT EXISTS scans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    matter_id INTEGER NOT NULL REFERENCES matters(id),
    document_id INTEGER NOT NULL REFERENCES documents(id),
    doc_type TEXT NOT NULL,
    ruleset_version INTEGER NOT NULL,
    fields_json TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scans_matter ON scans(matter_id);

CREATE TABLE IF NOT EXISTS risk_findings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scan_id INTEGER NOT NULL REFERENCES scans(id),
    matter_id INTEGER NOT NULL REFERENCES matters(id),
    document_id INTEGER NOT NULL REFERENCES documents(id),
    category TEXT NOT NULL,
    raw_value TEXT NOT NULL,
    weight REAL NOT NULL,
    severity TEXT NOT NULL,
    snippet TEXT NOT NULL DEFAULT '',
    position INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_findings_scan ON risk_findings(scan_id);
CREATE INDEX IF NOT EXISTS idx_findings_matter ON risk_findings(matter_id);
"#;
