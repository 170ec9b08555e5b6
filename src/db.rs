use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::model::{Assignment, ClassRecord, ScoreValue};

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("gradebook.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            last_visited INTEGER,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            weight REAL NOT NULL,
            earned_score REAL,
            total_score REAL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_class ON assignments(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_class_sort ON assignments(class_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS available_weights(
            weight REAL PRIMARY KEY
        )",
        [],
    )?;

    // Pristine post-extraction snapshots backing "restore original".
    conn.execute(
        "CREATE TABLE IF NOT EXISTS original_classes(
            class_id TEXT PRIMARY KEY,
            snapshot TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn load_class(conn: &Connection, class_id: &str) -> anyhow::Result<Option<ClassRecord>> {
    let head: Option<(String, Option<i64>)> = conn
        .query_row(
            "SELECT name, last_visited FROM classes WHERE id = ?",
            [class_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((name, last_visited)) = head else {
        return Ok(None);
    };

    Ok(Some(ClassRecord {
        id: class_id.to_string(),
        name,
        assignments: load_assignments(conn, class_id)?,
        last_visited,
    }))
}

fn load_assignments(conn: &Connection, class_id: &str) -> anyhow::Result<Vec<Assignment>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, date, weight, earned_score, total_score
         FROM assignments
         WHERE class_id = ?
         ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            Ok(Assignment {
                id: r.get(0)?,
                name: r.get(1)?,
                date: r.get(2)?,
                weight: r.get(3)?,
                earned_score: ScoreValue::from_f64(r.get::<_, Option<f64>>(4)?),
                total_score: ScoreValue::from_f64(r.get::<_, Option<f64>>(5)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_class(conn: &Connection, record: &ClassRecord, sort_order: i64) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO classes(id, name, last_visited, sort_order) VALUES(?, ?, ?, ?)",
        (&record.id, &record.name, record.last_visited, sort_order),
    )?;
    insert_assignments(conn, record)?;
    Ok(())
}

fn insert_assignments(conn: &Connection, record: &ClassRecord) -> anyhow::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO assignments(id, class_id, name, date, weight, earned_score, total_score, sort_order)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
    )?;
    for (i, a) in record.assignments.iter().enumerate() {
        stmt.execute((
            &a.id,
            &record.id,
            &a.name,
            &a.date,
            a.weight,
            a.earned_score.as_f64(),
            a.total_score.as_f64(),
            i as i64,
        ))?;
    }
    Ok(())
}

/// Write a class back: head fields updated in place, assignments replaced
/// wholesale (the record is the unit of mutation).
pub fn save_class(conn: &Connection, record: &ClassRecord) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE classes SET name = ?, last_visited = ? WHERE id = ?",
        (&record.name, record.last_visited, &record.id),
    )?;
    tx.execute("DELETE FROM assignments WHERE class_id = ?", [&record.id])?;
    insert_assignments(&tx, record)?;
    tx.commit()?;
    Ok(())
}

pub fn delete_class(conn: &Connection, class_id: &str) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    // Explicitly delete in dependency order (no ON DELETE CASCADE).
    tx.execute("DELETE FROM assignments WHERE class_id = ?", [class_id])?;
    tx.execute("DELETE FROM classes WHERE id = ?", [class_id])?;
    tx.commit()?;
    Ok(())
}

/// Bulk import: the new submission replaces every stored class and original
/// snapshot in one transaction.
pub fn replace_all_classes(conn: &Connection, records: &[ClassRecord]) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM assignments", [])?;
    tx.execute("DELETE FROM classes", [])?;
    tx.execute("DELETE FROM original_classes", [])?;
    for (i, record) in records.iter().enumerate() {
        insert_class(&tx, record, i as i64)?;
        original_set(&tx, record)?;
    }
    tx.commit()?;
    Ok(())
}

pub fn next_sort_order(conn: &Connection) -> anyhow::Result<i64> {
    let max: Option<i64> =
        conn.query_row("SELECT MAX(sort_order) FROM classes", [], |r| r.get(0))?;
    Ok(max.map(|m| m + 1).unwrap_or(0))
}

pub fn set_last_visited(conn: &Connection, class_id: &str, stamp: i64) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE classes SET last_visited = ? WHERE id = ?",
        (stamp, class_id),
    )?;
    Ok(())
}

pub fn weights_add(conn: &Connection, weight: f64) -> anyhow::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO available_weights(weight) VALUES(?)",
        [weight],
    )?;
    Ok(())
}

pub fn weights_list(conn: &Connection) -> anyhow::Result<Vec<f64>> {
    let mut stmt = conn.prepare("SELECT weight FROM available_weights ORDER BY weight")?;
    let rows = stmt
        .query_map([], |r| r.get::<_, f64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn original_set(conn: &Connection, record: &ClassRecord) -> anyhow::Result<()> {
    let snapshot = serde_json::to_string(record)?;
    conn.execute(
        "INSERT INTO original_classes(class_id, snapshot) VALUES(?, ?)
         ON CONFLICT(class_id) DO UPDATE SET snapshot = excluded.snapshot",
        (&record.id, &snapshot),
    )?;
    Ok(())
}

pub fn original_get(conn: &Connection, class_id: &str) -> anyhow::Result<Option<ClassRecord>> {
    let snapshot: Option<String> = conn
        .query_row(
            "SELECT snapshot FROM original_classes WHERE class_id = ?",
            [class_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(snapshot) = snapshot else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_str(&snapshot)?))
}

pub fn settings_set(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, value),
    )?;
    Ok(())
}

pub fn settings_get(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let value: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(value)
}
