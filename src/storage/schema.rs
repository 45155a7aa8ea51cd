//! Table registry.
//!
//! Static mapping from each event kind to the DDL that creates its table
//! and the positional insert template for its records. Column order in the
//! template is the order in which handlers bind record fields.

use std::fmt;

/// Event categories accepted by the sink. Each maps to exactly one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    HttpAccess,
    CspViolation,
    Beacon,
    RepoStar,
}

impl EventKind {
    /// Every kind, in registry order.
    pub const ALL: [EventKind; 4] = [
        EventKind::HttpAccess,
        EventKind::CspViolation,
        EventKind::Beacon,
        EventKind::RepoStar,
    ];

    /// Position of this kind in [`EventKind::ALL`].
    pub const fn index(self) -> usize {
        match self {
            EventKind::HttpAccess => 0,
            EventKind::CspViolation => 1,
            EventKind::Beacon => 2,
            EventKind::RepoStar => 3,
        }
    }

    /// Table definition for this kind.
    pub fn table(self) -> &'static TableSpec {
        &TABLES[self.index()]
    }

    /// Short name used in logs and error messages (the table name).
    pub fn as_str(self) -> &'static str {
        self.table().name
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema and insert template for one table.
#[derive(Debug)]
pub struct TableSpec {
    pub kind: EventKind,
    pub name: &'static str,
    /// Column names in bind order.
    pub columns: &'static [&'static str],
    pub create: &'static str,
    pub insert: &'static str,
}

impl TableSpec {
    /// Number of values an insert must bind.
    pub fn arity(&self) -> usize {
        self.columns.len()
    }
}

/// SQL for creating the HTTP access log table.
pub const CREATE_HTTP_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS http (
    timestamp TEXT,
    method TEXT,
    domain TEXT,
    path TEXT,
    remote TEXT,
    user_agent TEXT,
    referrer TEXT
)"#;

pub const INSERT_HTTP: &str = r#"
INSERT INTO http (timestamp, method, domain, path, remote, user_agent, referrer)
VALUES (?, ?, ?, ?, ?, ?, ?)"#;

/// SQL for creating the CSP violation report table.
pub const CREATE_CSP_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS csp (
    timestamp TEXT,
    remote TEXT,
    user_agent TEXT,
    referrer TEXT,
    enforce TEXT,
    blocked_uri TEXT,
    source_file TEXT,
    document_uri TEXT,
    violated_directive TEXT,
    effective_directive TEXT,
    line_number INTEGER,
    status_code INTEGER
)"#;

pub const INSERT_CSP: &str = r#"
INSERT INTO csp (timestamp, remote, user_agent, referrer, enforce, blocked_uri, source_file, document_uri, violated_directive, effective_directive, line_number, status_code)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#;

/// SQL for creating the navigation beacon table.
pub const CREATE_BEACON_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS beacon (
    duration_ms INTEGER,
    src_page TEXT,
    dst_page TEXT,
    remote TEXT,
    user_agent TEXT,
    referrer TEXT
)"#;

pub const INSERT_BEACON: &str = r#"
INSERT INTO beacon (duration_ms, src_page, dst_page, remote, user_agent, referrer)
VALUES (?, ?, ?, ?, ?, ?)"#;

/// SQL for creating the repository star table.
pub const CREATE_REPO_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS repo (
    timestamp TEXT,
    owner TEXT,
    repo TEXT
)"#;

pub const INSERT_REPO: &str = r#"
INSERT INTO repo (timestamp, owner, repo)
VALUES (?, ?, ?)"#;

static TABLES: [TableSpec; 4] = [
    TableSpec {
        kind: EventKind::HttpAccess,
        name: "http",
        columns: &[
            "timestamp",
            "method",
            "domain",
            "path",
            "remote",
            "user_agent",
            "referrer",
        ],
        create: CREATE_HTTP_TABLE,
        insert: INSERT_HTTP,
    },
    TableSpec {
        kind: EventKind::CspViolation,
        name: "csp",
        columns: &[
            "timestamp",
            "remote",
            "user_agent",
            "referrer",
            "enforce",
            "blocked_uri",
            "source_file",
            "document_uri",
            "violated_directive",
            "effective_directive",
            "line_number",
            "status_code",
        ],
        create: CREATE_CSP_TABLE,
        insert: INSERT_CSP,
    },
    TableSpec {
        kind: EventKind::Beacon,
        name: "beacon",
        columns: &[
            "duration_ms",
            "src_page",
            "dst_page",
            "remote",
            "user_agent",
            "referrer",
        ],
        create: CREATE_BEACON_TABLE,
        insert: INSERT_BEACON,
    },
    TableSpec {
        kind: EventKind::RepoStar,
        name: "repo",
        columns: &["timestamp", "owner", "repo"],
        create: CREATE_REPO_TABLE,
        insert: INSERT_REPO,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order_matches_index() {
        for (i, kind) in EventKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(kind.table().kind, *kind);
        }
    }

    #[test]
    fn test_placeholder_count_matches_columns() {
        for kind in EventKind::ALL {
            let table = kind.table();
            let placeholders = table.insert.matches('?').count();
            assert_eq!(placeholders, table.arity(), "placeholder mismatch for {}", kind);
        }
    }

    #[test]
    fn test_insert_columns_in_bind_order() {
        for kind in EventKind::ALL {
            let table = kind.table();
            let expected = format!("INSERT INTO {} ({})", table.name, table.columns.join(", "));
            assert!(
                table.insert.contains(&expected),
                "insert template for {} should contain {:?}",
                kind,
                expected
            );
        }
    }

    #[test]
    fn test_create_targets_own_table() {
        for kind in EventKind::ALL {
            let table = kind.table();
            let expected = format!("CREATE TABLE IF NOT EXISTS {} (", table.name);
            assert!(table.create.contains(&expected), "{}", kind);
            for column in table.columns {
                assert!(table.create.contains(column), "{} missing {}", kind, column);
            }
        }
    }

    #[test]
    fn test_table_names_distinct() {
        let mut names: Vec<_> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EventKind::ALL.len());
    }

    #[test]
    fn test_display_uses_table_name() {
        assert_eq!(EventKind::HttpAccess.to_string(), "http");
        assert_eq!(EventKind::CspViolation.to_string(), "csp");
        assert_eq!(EventKind::Beacon.to_string(), "beacon");
        assert_eq!(EventKind::RepoStar.to_string(), "repo");
    }
}
