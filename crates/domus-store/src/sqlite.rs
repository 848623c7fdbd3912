//! SQLite store for matters, documents, scans and risk findings.
//!
//! A single connection behind a mutex. Multi-statement writes (a scan and
//! its findings) run in one transaction so readers never observe a scan
//! without its findings.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::schema::SCHEMA_SQL;
use crate::types::*;
use domus_core::{now_millis, Error, Result};

const MATTER_COLUMNS: &str = "id, ref, council, uprn, title_number, address_text, postcode, \
                              status, created_at, approved_at, first_scan_at";
const DOCUMENT_COLUMNS: &str = "id, matter_id, kind, filename, content_type, size_bytes, \
                                storage_pointer, ocr_text, ocr_applied, created_at";
const SCAN_COLUMNS: &str =
    "id, matter_id, document_id, doc_type, ruleset_version, fields_json, created_at";
const FINDING_COLUMNS: &str = "id, scan_id, matter_id, document_id, category, raw_value, \
                               weight, severity, snippet, position, created_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create the store. The file is `db_dir/domus.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("domus.db");

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        info!(
            "SqliteStore initialized: {} matters, path={}",
            store.count_matters()?,
            store.db_path.display()
        );
        Ok(store)
    }

    /// In-memory store for tests and one-shot CLI runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| Error::Database(e.to_string()))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Cheap round trip used by the readiness check.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| Error::DependencyUnavailable(format!("database: {}", e)))?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Matters
    // ---------------------------------------------------------------

    /// Insert a matter and return the row just created. A duplicate `ref`
    /// is a [`Error::Conflict`].
    pub fn create_matter(&self, new: &NewMatter) -> Result<Matter> {
        let now = now_millis();
        let conn = self.conn.lock();
        let id = conn
            .prepare_cached(
                "INSERT INTO matters (ref, council, status, created_at) VALUES (?1, ?2, 'received', ?3)",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .insert(params![new.reference, new.council, now])
            .map_err(|e| {
                if e.to_string().contains("UNIQUE constraint") {
                    Error::Conflict(format!("matter ref already exists: {}", new.reference))
                } else {
                    Error::Database(e.to_string())
                }
            })?;

        debug!(matter_id = id, reference = %new.reference, "matter created");
        Ok(Matter {
            id,
            reference: new.reference.clone(),
            council: new.council.clone(),
            property: Property::default(),
            status: MatterStatus::Received,
            created_at: now,
            approved_at: None,
            first_scan_at: None,
        })
    }

    pub fn get_matter(&self, id: i64) -> Result<Option<Matter>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {MATTER_COLUMNS} FROM matters WHERE id = ?1");
        let row = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![id], |row| Ok(Self::row_to_matter(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row)
    }

    pub fn find_matter_by_ref(&self, reference: &str) -> Result<Option<Matter>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {MATTER_COLUMNS} FROM matters WHERE ref = ?1");
        let row = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![reference], |row| Ok(Self::row_to_matter(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row)
    }

    /// Newest first.
    pub fn list_matters(&self, limit: usize) -> Result<Vec<Matter>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {MATTER_COLUMNS} FROM matters ORDER BY created_at DESC, id DESC LIMIT ?1"
        );
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![limit as i64], |row| Ok(Self::row_to_matter(row)))
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn count_matters(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM matters", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Merge `update` into the matter's property. Returns the updated matter,
    /// or `None` if the matter does not exist.
    pub fn update_property(&self, id: i64, update: &PropertyUpdate) -> Result<Option<Matter>> {
        let changed = {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE matters SET
                    uprn = COALESCE(?2, uprn),
                    title_number = COALESCE(?3, title_number),
                    address_text = COALESCE(?4, address_text),
                    postcode = COALESCE(?5, postcode)
                 WHERE id = ?1",
                params![
                    id,
                    update.uprn,
                    update.title_number,
                    update.address_text,
                    update.postcode
                ],
            )
            .map_err(|e| Error::Database(e.to_string()))?
        };
        if changed == 0 {
            return Ok(None);
        }
        self.get_matter(id)
    }

    /// Move a matter to `to` if its current status is one of `from`.
    ///
    /// Returns `Ok(false)` when the current status is not in `from`.
    /// Entering `processing` stamps `first_scan_at` once; entering
    /// `approved` stamps `approved_at` once.
    pub fn transition_status(
        &self,
        id: i64,
        from: &[MatterStatus],
        to: MatterStatus,
    ) -> Result<bool> {
        let now = now_millis();
        let conn = self.conn.lock();

        let current: Option<String> = conn
            .prepare_cached("SELECT status FROM matters WHERE id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![id], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        let Some(current) = current else {
            return Err(Error::NotFound(format!("matter {}", id)));
        };
        let allowed = MatterStatus::parse(&current)
            .map(|status| from.contains(&status))
            .unwrap_or(false);
        if !allowed {
            return Ok(false);
        }

        conn.execute(
            "UPDATE matters SET
                status = ?2,
                approved_at = CASE WHEN ?2 = 'approved' THEN COALESCE(approved_at, ?3) ELSE approved_at END,
                first_scan_at = CASE WHEN ?2 = 'processing' THEN COALESCE(first_scan_at, ?3) ELSE first_scan_at END
             WHERE id = ?1",
            params![id, to.as_str(), now],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        debug!(matter_id = id, from = %current, to = %to, "matter status changed");
        Ok(true)
    }

    // ---------------------------------------------------------------
    // Documents
    // ---------------------------------------------------------------

    pub fn add_document(&self, new: &NewDocument) -> Result<DocumentRecord> {
        let now = now_millis();
        let conn = self.conn.lock();
        let id = conn
            .prepare_cached(
                "INSERT INTO documents (matter_id, kind, filename, content_type, size_bytes, storage_pointer, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .insert(params![
                new.matter_id,
                new.kind,
                new.filename,
                new.content_type,
                new.size_bytes,
                new.storage_pointer,
                now
            ])
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(DocumentRecord {
            id,
            matter_id: new.matter_id,
            kind: new.kind.clone(),
            filename: new.filename.clone(),
            content_type: new.content_type.clone(),
            size_bytes: new.size_bytes,
            storage_pointer: new.storage_pointer.clone(),
            ocr_text: None,
            ocr_applied: false,
            created_at: now,
        })
    }

    pub fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1");
        let row = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![id], |row| Ok(Self::row_to_document(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row)
    }

    /// Oldest first, so the last element is the latest upload.
    pub fn list_documents(&self, matter_id: i64) -> Result<Vec<DocumentRecord>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE matter_id = ?1 ORDER BY id");
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![matter_id], |row| Ok(Self::row_to_document(row)))
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn latest_document(&self, matter_id: i64) -> Result<Option<DocumentRecord>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE matter_id = ?1 ORDER BY id DESC LIMIT 1"
        );
        let row = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![matter_id], |row| Ok(Self::row_to_document(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row)
    }

    /// Store extracted text on a document. Only the first write wins;
    /// returns `false` if text was already present.
    pub fn set_ocr_text(&self, document_id: i64, text: &str, ocr_applied: bool) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE documents SET ocr_text = ?2, ocr_applied = ?3 WHERE id = ?1 AND ocr_text IS NULL",
                params![document_id, text, ocr_applied],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(changed > 0)
    }

    // ---------------------------------------------------------------
    // Scans and findings
    // ---------------------------------------------------------------

    /// Persist a scan and its findings atomically.
    pub fn record_scan(&self, new: &NewScan) -> Result<RecordedScan> {
        let now = now_millis();
        let fields_json = serde_json::to_string(&new.fields)?;

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(e.to_string()))?;

        tx.execute(
            "INSERT INTO scans (matter_id, document_id, doc_type, ruleset_version, fields_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.matter_id,
                new.document_id,
                new.doc_type,
                new.ruleset_version,
                fields_json,
                now
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        let scan_id = tx.last_insert_rowid();

        let mut findings = Vec::with_capacity(new.findings.len());
        for (position, finding) in new.findings.iter().enumerate() {
            tx.execute(
                "INSERT INTO risk_findings
                    (scan_id, matter_id, document_id, category, raw_value, weight, severity, snippet, position, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    scan_id,
                    new.matter_id,
                    new.document_id,
                    finding.category,
                    finding.raw_value,
                    finding.weight,
                    finding.severity,
                    finding.snippet,
                    position as i64,
                    now
                ],
            )
            .map_err(|e| Error::Database(e.to_string()))?;

            findings.push(FindingRecord {
                id: tx.last_insert_rowid(),
                scan_id,
                matter_id: new.matter_id,
                document_id: new.document_id,
                category: finding.category.clone(),
                raw_value: finding.raw_value.clone(),
                weight: finding.weight,
                severity: finding.severity.clone(),
                snippet: finding.snippet.clone(),
                position: position as i64,
                created_at: now,
            });
        }

        tx.commit().map_err(|e| Error::Database(e.to_string()))?;

        debug!(
            scan_id,
            matter_id = new.matter_id,
            document_id = new.document_id,
            findings = findings.len(),
            "scan recorded"
        );

        Ok(RecordedScan {
            scan: ScanRecord {
                id: scan_id,
                matter_id: new.matter_id,
                document_id: new.document_id,
                doc_type: new.doc_type.clone(),
                ruleset_version: new.ruleset_version,
                fields: new.fields.clone(),
                created_at: now,
            },
            findings,
        })
    }

    pub fn latest_scan(&self, matter_id: i64) -> Result<Option<ScanRecord>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {SCAN_COLUMNS} FROM scans WHERE matter_id = ?1 ORDER BY id DESC LIMIT 1"
        );
        let row = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![matter_id], |row| Ok(Self::row_to_scan(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row)
    }

    /// Oldest first.
    pub fn list_scans(&self, matter_id: i64) -> Result<Vec<ScanRecord>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {SCAN_COLUMNS} FROM scans WHERE matter_id = ?1 ORDER BY id");
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![matter_id], |row| Ok(Self::row_to_scan(row)))
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Findings of the matter's latest scan, in discovery order.
    pub fn current_findings(&self, matter_id: i64) -> Result<Vec<FindingRecord>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {FINDING_COLUMNS} FROM risk_findings
             WHERE scan_id = (SELECT MAX(id) FROM scans WHERE matter_id = ?1)
             ORDER BY position"
        );
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![matter_id], |row| Ok(Self::row_to_finding(row)))
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // ---------------------------------------------------------------
    // Row mapping
    // ---------------------------------------------------------------

    fn row_to_matter(row: &rusqlite::Row<'_>) -> Matter {
        let status: String = row.get("status").unwrap_or_default();
        Matter {
            id: row.get("id").unwrap_or(0),
            reference: row.get("ref").unwrap_or_default(),
            council: row.get("council").ok().flatten(),
            property: Property {
                uprn: row.get("uprn").ok().flatten(),
                title_number: row.get("title_number").ok().flatten(),
                address_text: row.get("address_text").ok().flatten(),
                postcode: row.get("postcode").ok().flatten(),
            },
            status: MatterStatus::parse(&status).unwrap_or(MatterStatus::Received),
            created_at: row.get("created_at").unwrap_or(0),
            approved_at: row.get("approved_at").ok().flatten(),
            first_scan_at: row.get("first_scan_at").ok().flatten(),
        }
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> DocumentRecord {
        DocumentRecord {
            id: row.get("id").unwrap_or(0),
            matter_id: row.get("matter_id").unwrap_or(0),
            kind: row.get("kind").unwrap_or_default(),
            filename: row.get("filename").unwrap_or_default(),
            content_type: row.get("content_type").ok().flatten(),
            size_bytes: row.get("size_bytes").unwrap_or(0),
            storage_pointer: row.get("storage_pointer").unwrap_or_default(),
            ocr_text: row.get("ocr_text").ok().flatten(),
            ocr_applied: row.get("ocr_applied").unwrap_or(false),
            created_at: row.get("created_at").unwrap_or(0),
        }
    }

    fn row_to_scan(row: &rusqlite::Row<'_>) -> ScanRecord {
        ScanRecord {
            id: row.get("id").unwrap_or(0),
            matter_id: row.get("matter_id").unwrap_or(0),
            document_id: row.get("document_id").unwrap_or(0),
            doc_type: row.get("doc_type").unwrap_or_default(),
            ruleset_version: row.get("ruleset_version").unwrap_or(0),
            fields: row
                .get::<_, String>("fields_json")
                .ok()
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or(serde_json::Value::Null),
            created_at: row.get("created_at").unwrap_or(0),
        }
    }

    fn row_to_finding(row: &rusqlite::Row<'_>) -> FindingRecord {
        FindingRecord {
            id: row.get("id").unwrap_or(0),
            scan_id: row.get("scan_id").unwrap_or(0),
            matter_id: row.get("matter_id").unwrap_or(0),
            document_id: row.get("document_id").unwrap_or(0),
            category: row.get("category").unwrap_or_default(),
            raw_value: row.get("raw_value").unwrap_or_default(),
            weight: row.get("weight").unwrap_or(0.0),
            severity: row.get("severity").unwrap_or_default(),
            snippet: row.get("snippet").unwrap_or_default(),
            position: row.get("position").unwrap_or(0),
            created_at: row.get("created_at").unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn matter(store: &SqliteStore, reference: &str) -> Matter {
        store
            .create_matter(&NewMatter {
                reference: reference.into(),
                council: Some("Hertfordshire".into()),
            })
            .unwrap()
    }

    fn document(store: &SqliteStore, matter_id: i64) -> DocumentRecord {
        store
            .add_document(&NewDocument {
                matter_id,
                kind: "search".into(),
                filename: "search.pdf".into(),
                content_type: Some("application/pdf".into()),
                size_bytes: 42,
                storage_pointer: "abc_search.pdf".into(),
            })
            .unwrap()
    }

    fn finding(category: &str, weight: f64) -> NewFinding {
        NewFinding {
            category: category.into(),
            raw_value: "present".into(),
            weight,
            severity: "medium".into(),
            snippet: String::new(),
        }
    }

    #[test]
    fn test_create_and_get_matter() {
        let (store, _dir) = test_store();
        let created = matter(&store, "DMS/20260101/ABC123");
        let fetched = store.get_matter(created.id).unwrap().unwrap();
        assert_eq!(fetched.reference, "DMS/20260101/ABC123");
        assert_eq!(fetched.status, MatterStatus::Received);
        assert_eq!(fetched.council.as_deref(), Some("Hertfordshire"));
        assert!(store.get_matter(created.id + 100).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_ref_conflicts() {
        let (store, _dir) = test_store();
        matter(&store, "REF-1");
        let err = store
            .create_matter(&NewMatter {
                reference: "REF-1".into(),
                council: None,
            })
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_list_matters_newest_first() {
        let (store, _dir) = test_store();
        let a = matter(&store, "A");
        let b = matter(&store, "B");
        let ids: Vec<i64> = store.list_matters(10).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn test_property_update_merges() {
        let (store, _dir) = test_store();
        let m = matter(&store, "P");
        store
            .update_property(
                m.id,
                &PropertyUpdate {
                    uprn: Some("100081234567".into()),
                    postcode: Some("SG13 8AA".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        let updated = store
            .update_property(
                m.id,
                &PropertyUpdate {
                    address_text: Some("1 High Street".into()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.property.uprn.as_deref(), Some("100081234567"));
        assert_eq!(updated.property.address_text.as_deref(), Some("1 High Street"));
        assert!(store.update_property(9999, &PropertyUpdate::default()).unwrap().is_none());
    }

    #[test]
    fn test_status_transitions() {
        let (store, _dir) = test_store();
        let m = matter(&store, "S");
        assert!(!store
            .transition_status(m.id, &[MatterStatus::Processing], MatterStatus::Approved)
            .unwrap());
        assert!(store
            .transition_status(m.id, &[MatterStatus::Received], MatterStatus::Processing)
            .unwrap());
        assert!(store
            .transition_status(m.id, &[MatterStatus::Processing], MatterStatus::Approved)
            .unwrap());
        let approved = store.get_matter(m.id).unwrap().unwrap();
        assert_eq!(approved.status, MatterStatus::Approved);
        assert!(approved.approved_at.is_some());
        assert!(approved.first_scan_at.is_some());
        assert!(matches!(
            store.transition_status(9999, &[], MatterStatus::Failed),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_ocr_text_written_once() {
        let (store, _dir) = test_store();
        let m = matter(&store, "O");
        let d = document(&store, m.id);
        assert!(store.set_ocr_text(d.id, "first", false).unwrap());
        assert!(!store.set_ocr_text(d.id, "second", true).unwrap());
        let doc = store.get_document(d.id).unwrap().unwrap();
        assert_eq!(doc.ocr_text.as_deref(), Some("first"));
        assert!(!doc.ocr_applied);
    }

    #[test]
    fn test_latest_document() {
        let (store, _dir) = test_store();
        let m = matter(&store, "L");
        assert!(store.latest_document(m.id).unwrap().is_none());
        document(&store, m.id);
        let second = document(&store, m.id);
        assert_eq!(store.latest_document(m.id).unwrap().unwrap().id, second.id);
        assert_eq!(store.list_documents(m.id).unwrap().len(), 2);
    }

    #[test]
    fn test_current_findings_follow_latest_scan() {
        let (store, _dir) = test_store();
        let m = matter(&store, "F");
        let d = document(&store, m.id);

        assert!(store.current_findings(m.id).unwrap().is_empty());

        store
            .record_scan(&NewScan {
                matter_id: m.id,
                document_id: d.id,
                doc_type: "SEARCH".into(),
                ruleset_version: 1,
                fields: serde_json::json!([]),
                findings: vec![finding("FLOOD_ZONE", 0.6), finding("CIL", 0.2)],
            })
            .unwrap();
        let second = store
            .record_scan(&NewScan {
                matter_id: m.id,
                document_id: d.id,
                doc_type: "SEARCH".into(),
                ruleset_version: 1,
                fields: serde_json::json!([]),
                findings: vec![finding("RADON", 0.25)],
            })
            .unwrap();

        let current = store.current_findings(m.id).unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].category, "RADON");
        assert_eq!(current[0].scan_id, second.scan.id);
        assert_eq!(store.list_scans(m.id).unwrap().len(), 2);
        assert_eq!(store.latest_scan(m.id).unwrap().unwrap().id, second.scan.id);
    }

    #[test]
    fn test_ping() {
        let (store, _dir) = test_store();
        store.ping().unwrap();
        SqliteStore::open_in_memory().unwrap().ping().unwrap();
    }
}
