//! Family hashing
//!
//! A family hash groups recurring entries that share one root cause.
//! Exceptions hash their identity (class, file, line) and never the message,
//! which routinely embeds ids and other per-occurrence data. Queries hash
//! their whitespace-normalized SQL.

use sha2::{Digest, Sha256};

/// Fingerprint for an exception family
pub fn exception_family_hash(class: &str, file: &str, line: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(class.as_bytes());
    hasher.update(b"\0");
    hasher.update(file.as_bytes());
    hasher.update(b"\0");
    hasher.update(line.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fingerprint for a query family
pub fn query_family_hash(sql: &str) -> String {
    format!("{:x}", Sha256::digest(normalize_sql(sql).as_bytes()))
}

fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}
