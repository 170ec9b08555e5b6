use crate::db;
use crate::extract::{self, Extraction};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::ClassRecord;
use chrono::{Datelike, Local, Utc};
use serde_json::json;

/// Class ids are time-derived strings for compatibility with existing data;
/// bump past the last issued stamp so several extractions in one millisecond
/// (a concatenated submission) still get unique ids.
fn next_class_id(state: &mut AppState) -> String {
    let mut stamp = Utc::now().timestamp_millis();
    if stamp <= state.last_class_stamp {
        stamp = state.last_class_stamp + 1;
    }
    state.last_class_stamp = stamp;
    stamp.to_string()
}

fn warnings_for(e: &Extraction) -> Vec<serde_json::Value> {
    let mut warnings: Vec<serde_json::Value> = Vec::new();
    if !e.marker_found {
        warnings.push(json!({
            "code": "marker_not_found",
            "message": "no 'Grade Book' marker in submission; created an empty placeholder class"
        }));
    }
    for s in &e.skipped {
        warnings.push(json!({
            "code": "assignment_skipped",
            "name": s.name,
            "score": s.score,
            "total": s.total,
        }));
    }
    warnings
}

fn class_result(e: &Extraction) -> serde_json::Value {
    json!({
        "classId": e.record.id,
        "name": e.record.name,
        "assignmentCount": e.record.assignments.len(),
        "markerFound": e.marker_found,
        "discardedText": e.discarded_text,
        "warnings": warnings_for(e),
    })
}

/// Bulk upload: split the submission on the triple-newline class separator,
/// extract every chunk, and replace the whole workspace with the result.
fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let raw = match req.params.get("rawText").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing rawText", None),
    };

    let year = Local::now().year();
    let mut extractions: Vec<Extraction> = Vec::new();
    for chunk in extract::split_submissions(raw) {
        let class_id = next_class_id(state);
        extractions.push(extract::extract_class(chunk, &class_id, year));
    }

    let records: Vec<ClassRecord> = extractions.iter().map(|e| e.record.clone()).collect();
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = db::replace_all_classes(conn, &records) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }

    // The import replaces everything; stale undo state must not survive it.
    state.history.reset();

    let classes: Vec<serde_json::Value> = extractions.iter().map(class_result).collect();
    ok(&req.id, json!({ "classes": classes }))
}

/// Paste one more class into the existing workspace.
fn handle_class_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let raw = match req.params.get("rawText").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing rawText", None),
    };

    let class_id = next_class_id(state);
    let ex = extract::extract_class(raw, &class_id, Local::now().year());

    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let sort_order = match db::next_sort_order(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Err(e) = db::insert_class(&tx, &ex.record, sort_order) {
        let _ = tx.rollback();
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    if let Err(e) = db::original_set(&tx, &ex.record) {
        let _ = tx.rollback();
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    // A newly pasted class invalidates redoing earlier deletions.
    state.history.clear_redo_deleted();

    let record = match serde_json::to_value(&ex.record) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "encode_failed", e.to_string(), None),
    };
    ok(
        &req.id,
        json!({
            "class": record,
            "markerFound": ex.marker_found,
            "discardedText": ex.discarded_text,
            "warnings": warnings_for(&ex),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "gradebook.import" => Some(handle_import(state, req)),
        "classes.add" => Some(handle_class_add(state, req)),
        _ => None,
    }
}
