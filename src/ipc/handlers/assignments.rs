use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{Assignment, ClassRecord, ScoreValue};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct NewAssignment {
    name: String,
    date: String,
    weight: f64,
    #[serde(default)]
    earned_score: ScoreValue,
    #[serde(default)]
    total_score: ScoreValue,
}

/// The source derived id suffixes from the list length, which collides after
/// a delete-then-add. Take one past the highest existing suffix instead; id
/// uniqueness within a class is an invariant.
fn next_assignment_id(record: &ClassRecord) -> String {
    let prefix = format!("{}-", record.id);
    let next = record
        .assignments
        .iter()
        .filter_map(|a| a.id.strip_prefix(prefix.as_str()))
        .filter_map(|s| s.parse::<u64>().ok())
        .max()
        .map(|n| n + 1)
        .unwrap_or(record.assignments.len() as u64);
    format!("{}{}", prefix, next)
}

struct EditContext {
    class_id: String,
    current: ClassRecord,
}

fn load_edit_context(
    state: &AppState,
    req: &Request,
) -> Result<EditContext, serde_json::Value> {
    let Some(conn) = state.db.as_ref() else {
        return Err(err(&req.id, "no_workspace", "select a workspace first", None));
    };
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_str()) else {
        return Err(err(&req.id, "bad_params", "missing classId", None));
    };
    match db::load_class(conn, class_id) {
        Ok(Some(current)) => Ok(EditContext {
            class_id: class_id.to_string(),
            current,
        }),
        Ok(None) => Err(err(&req.id, "not_found", "class not found", None)),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

/// Record the edit in session history and write the class through to the
/// store, answering with the updated record.
fn commit_edit(
    state: &mut AppState,
    req: &Request,
    ctx: EditContext,
    updated: ClassRecord,
) -> serde_json::Value {
    state.history.ensure(&ctx.class_id, &ctx.current);
    state.history.record_edit(&ctx.class_id, updated.clone());

    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = db::save_class(conn, &updated) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    match serde_json::to_value(&updated) {
        Ok(v) => ok(&req.id, json!({ "class": v })),
        Err(e) => err(&req.id, "encode_failed", e.to_string(), None),
    }
}

fn handle_assignments_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match load_edit_context(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let Some(raw) = req.params.get("assignment") else {
        return err(&req.id, "bad_params", "missing assignment", None);
    };
    let new: NewAssignment = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    if new.name.trim().is_empty() {
        return err(&req.id, "bad_params", "assignment name must not be empty", None);
    }
    if !new.weight.is_finite() || !(0.0..=100.0).contains(&new.weight) {
        return err(&req.id, "bad_params", "weight must be between 0 and 100", None);
    }

    let mut updated = ctx.current.clone();
    let id = next_assignment_id(&updated);
    updated.assignments.push(Assignment {
        id,
        name: new.name,
        date: new.date,
        weight: new.weight,
        earned_score: new.earned_score,
        total_score: new.total_score,
    });

    commit_edit(state, req, ctx, updated)
}

fn handle_assignments_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match load_edit_context(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(assignment_id) = req.params.get("assignmentId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing assignmentId", None);
    };
    let Some(updates) = req.params.get("updates").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing updates object", None);
    };

    let mut updated = ctx.current.clone();
    let Some(target) = updated.assignments.iter_mut().find(|a| a.id == assignment_id) else {
        return err(&req.id, "not_found", "assignment not found", None);
    };

    for (key, value) in updates {
        match key.as_str() {
            "name" => {
                let Some(v) = value.as_str().map(str::trim).filter(|v| !v.is_empty()) else {
                    return err(&req.id, "bad_params", "name must be a non-empty string", None);
                };
                target.name = v.to_string();
            }
            "date" => {
                let Some(v) = value.as_str() else {
                    return err(&req.id, "bad_params", "date must be a string", None);
                };
                target.date = v.to_string();
            }
            "weight" => {
                let Some(v) = value.as_f64().filter(|v| (0.0..=100.0).contains(v)) else {
                    return err(&req.id, "bad_params", "weight must be between 0 and 100", None);
                };
                target.weight = v;
            }
            "earnedScore" => match serde_json::from_value::<ScoreValue>(value.clone()) {
                Ok(v) => target.earned_score = v,
                Err(_) => {
                    return err(&req.id, "bad_params", "earnedScore must be a number or string", None)
                }
            },
            "totalScore" => match serde_json::from_value::<ScoreValue>(value.clone()) {
                Ok(v) => target.total_score = v,
                Err(_) => {
                    return err(&req.id, "bad_params", "totalScore must be a number or string", None)
                }
            },
            other => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown assignment field: {}", other),
                    None,
                )
            }
        }
    }

    commit_edit(state, req, ctx, updated)
}

fn handle_assignments_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match load_edit_context(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(assignment_id) = req.params.get("assignmentId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing assignmentId", None);
    };

    let mut updated = ctx.current.clone();
    let before = updated.assignments.len();
    updated.assignments.retain(|a| a.id != assignment_id);
    if updated.assignments.len() == before {
        return err(&req.id, "not_found", "assignment not found", None);
    }

    commit_edit(state, req, ctx, updated)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.add" => Some(handle_assignments_add(state, req)),
        "assignments.update" => Some(handle_assignments_update(state, req)),
        "assignments.delete" => Some(handle_assignments_delete(state, req)),
        _ => None,
    }
}
