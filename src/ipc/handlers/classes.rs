use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::ClassRecord;
use chrono::Utc;
use serde_json::json;

const LAST_VISITED_KEY: &str = "last_visited_class";

fn require_class_id<'a>(req: &'a Request) -> Result<&'a str, serde_json::Value> {
    req.params
        .get("classId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| err(&req.id, "bad_params", "missing classId", None))
}

fn record_json(req: &Request, record: &ClassRecord) -> Result<serde_json::Value, serde_json::Value> {
    serde_json::to_value(record).map_err(|e| err(&req.id, "encode_failed", e.to_string(), None))
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };

    // Counts come from a correlated subquery so the list stays one row per class.
    let mut stmt = match conn.prepare(
        "SELECT
           c.id,
           c.name,
           c.last_visited,
           (SELECT COUNT(*) FROM assignments a WHERE a.class_id = c.id) AS assignment_count
         FROM classes c
         ORDER BY c.sort_order",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let last_visited: Option<i64> = row.get(2)?;
            let assignment_count: i64 = row.get(3)?;
            Ok(json!({
                "id": id,
                "name": name,
                "lastVisited": last_visited,
                "assignmentCount": assignment_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    let classes = match rows {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let last_visited_class = match db::settings_get(conn, LAST_VISITED_KEY) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({ "classes": classes, "lastVisitedClassId": last_visited_class }),
    )
}

fn handle_classes_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match require_class_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match db::load_class(conn, class_id) {
        Ok(Some(record)) => match record_json(req, &record) {
            Ok(v) => ok(&req.id, json!({ "class": v })),
            Err(resp) => resp,
        },
        Ok(None) => err(&req.id, "not_found", "class not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_classes_rename(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match require_class_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }

    let current = match db::load_class(conn, class_id) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "class not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut updated = current.clone();
    updated.name = name;

    state.history.ensure(class_id, &current);
    state.history.record_edit(class_id, updated.clone());

    if let Err(e) = db::save_class(conn, &updated) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    match record_json(req, &updated) {
        Ok(v) => ok(&req.id, json!({ "class": v })),
        Err(resp) => resp,
    }
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match require_class_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let record = match db::load_class(conn, class_id) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "class not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    if let Err(e) = db::delete_class(conn, class_id) {
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }

    state.history.forget(class_id);
    state.history.push_deleted(record);

    ok(&req.id, json!({ "ok": true }))
}

fn handle_classes_undo_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(record) = state.history.undo_delete() else {
        return ok(&req.id, json!({ "restored": false }));
    };

    let sort_order = match db::next_sort_order(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(e) = db::insert_class(conn, &record, sort_order) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "restored": true, "classId": record.id }))
}

fn handle_classes_redo_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(record) = state.history.redo_delete() else {
        return ok(&req.id, json!({ "deleted": false }));
    };

    if let Err(e) = db::delete_class(conn, &record.id) {
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }
    state.history.forget(&record.id);

    ok(&req.id, json!({ "deleted": true, "classId": record.id }))
}

fn handle_classes_restore_original(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match require_class_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let current = match db::load_class(conn, class_id) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "class not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let original = match db::original_get(conn, class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(mut restored) = original else {
        return ok(&req.id, json!({ "restored": false }));
    };

    // Visiting history is session metadata, not gradebook content.
    restored.last_visited = current.last_visited;

    state.history.ensure(class_id, &current);
    state.history.record_edit(class_id, restored.clone());

    if let Err(e) = db::save_class(conn, &restored) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    match record_json(req, &restored) {
        Ok(v) => ok(&req.id, json!({ "restored": true, "class": v })),
        Err(resp) => resp,
    }
}

fn handle_classes_set_last_visited(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match require_class_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match db::load_class(conn, class_id) {
        Ok(Some(_)) => {}
        Ok(None) => return err(&req.id, "not_found", "class not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let stamp = Utc::now().timestamp_millis();
    if let Err(e) = db::set_last_visited(conn, class_id, stamp) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    if let Err(e) = db::settings_set(conn, LAST_VISITED_KEY, class_id) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "classId": class_id, "lastVisited": stamp }))
}

fn handle_classes_undo(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match require_class_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let Some(record) = state.history.undo(class_id) else {
        return ok(&req.id, json!({ "changed": false }));
    };
    if let Err(e) = db::save_class(conn, &record) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    match record_json(req, &record) {
        Ok(v) => ok(&req.id, json!({ "changed": true, "class": v })),
        Err(resp) => resp,
    }
}

fn handle_classes_redo(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match require_class_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let Some(record) = state.history.redo(class_id) else {
        return ok(&req.id, json!({ "changed": false }));
    };
    if let Err(e) = db::save_class(conn, &record) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    match record_json(req, &record) {
        Ok(v) => ok(&req.id, json!({ "changed": true, "class": v })),
        Err(resp) => resp,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.get" => Some(handle_classes_get(state, req)),
        "classes.rename" => Some(handle_classes_rename(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        "classes.undoDelete" => Some(handle_classes_undo_delete(state, req)),
        "classes.redoDelete" => Some(handle_classes_redo_delete(state, req)),
        "classes.restoreOriginal" => Some(handle_classes_restore_original(state, req)),
        "classes.setLastVisited" => Some(handle_classes_set_last_visited(state, req)),
        "classes.undo" => Some(handle_classes_undo(state, req)),
        "classes.redo" => Some(handle_classes_redo(state, req)),
        _ => None,
    }
}
