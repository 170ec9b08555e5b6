use crate::calc;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Read model for the grade viewer: overall percentage, letter, GPA, and the
/// per-weight-group breakdown behind them.
fn handle_grades_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };

    let record = match db::load_class(conn, class_id) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "class not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let percentage = calc::compute_grade(&record);
    let groups: Vec<serde_json::Value> = calc::weight_groups(&record)
        .iter()
        .map(|g| {
            json!({
                "weight": g.weight,
                "earned": g.earned,
                "total": g.total,
                // null for groups with no possible points; they are excluded
                // from the overall grade rather than counted against it.
                "percentage": g.percentage(),
            })
        })
        .collect();

    ok(
        &req.id,
        json!({
            "classId": class_id,
            "name": record.name,
            "percentage": percentage,
            "letter": calc::letter_grade(percentage),
            "gpa": calc::gpa_value(percentage),
            "groups": groups,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.summary" => Some(handle_grades_summary(state, req)),
        _ => None,
    }
}
