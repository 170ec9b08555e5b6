use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_weights_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(weight) = req.params.get("weight").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "missing numeric weight", None);
    };
    if !weight.is_finite() || !(0.0..=100.0).contains(&weight) {
        return err(&req.id, "bad_params", "weight must be between 0 and 100", None);
    }

    // The palette is a set; re-adding an existing weight is a no-op.
    if let Err(e) = db::weights_add(conn, weight) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }

    match db::weights_list(conn) {
        Ok(weights) => ok(&req.id, json!({ "weights": weights })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_weights_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "weights": [] }));
    };
    match db::weights_list(conn) {
        Ok(weights) => ok(&req.id, json!({ "weights": weights })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "weights.add" => Some(handle_weights_add(state, req)),
        "weights.list" => Some(handle_weights_list(state, req)),
        _ => None,
    }
}
