//! Owner-scoped task routes.
//!
//! Every handler takes the caller's [`Identity`] and passes its user id to
//! the store. A task id belonging to someone else looks exactly like a
//! missing one.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::AppState;
use crate::auth::Identity;
use crate::error::Result;
use crate::filter::{FilterParams, due_window};
use crate::store::{NewTask, Priority, Task, TaskPatch, TaskQuery};

type PathParam = std::result::Result<Path<String>, PathRejection>;

pub(super) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(super) async fn list_tasks(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Json<Vec<Task>>> {
    let tasks = state
        .with_tasks(move |tasks| tasks.find_tasks(&identity.user_id, &TaskQuery::All))
        .await?;
    Ok(Json(tasks))
}

pub(super) async fn filter_tasks(
    identity: Identity,
    State(state): State<AppState>,
    params: std::result::Result<Query<FilterParams>, QueryRejection>,
) -> Result<Json<Vec<Task>>> {
    let Query(params) = params?;
    let period = params.period()?;
    let window = due_window(period, Utc::now())?;
    debug!(user_id = %identity.user_id, ?period, start = %window.start, end = %window.end, "filtering tasks");
    let query = window.as_query();
    let tasks = state
        .with_tasks(move |tasks| tasks.find_tasks(&identity.user_id, &query))
        .await?;
    Ok(Json(tasks))
}

pub(super) async fn overdue_tasks(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Json<Vec<Task>>> {
    let query = TaskQuery::Overdue { now: Utc::now() };
    let tasks = state
        .with_tasks(move |tasks| tasks.find_tasks(&identity.user_id, &query))
        .await?;
    Ok(Json(tasks))
}

pub(super) async fn tasks_by_category(
    identity: Identity,
    State(state): State<AppState>,
    category: PathParam,
) -> Result<Json<Vec<Task>>> {
    let Path(category) = category?;
    let query = TaskQuery::Category(category.trim().to_owned());
    let tasks = state
        .with_tasks(move |tasks| tasks.find_tasks(&identity.user_id, &query))
        .await?;
    Ok(Json(tasks))
}

pub(super) async fn tasks_by_priority(
    identity: Identity,
    State(state): State<AppState>,
    priority: PathParam,
) -> Result<Json<Vec<Task>>> {
    let Path(priority) = priority?;
    let query = TaskQuery::Priority(Priority::parse(&priority)?);
    let tasks = state
        .with_tasks(move |tasks| tasks.find_tasks(&identity.user_id, &query))
        .await?;
    Ok(Json(tasks))
}

/// Persist the task, then arm its reminder. The response does not wait on
/// the reminder.
pub(super) async fn create_task(
    identity: Identity,
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewTask>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>)> {
    let Json(new_task) = payload?;
    let new_task = new_task.normalized()?;
    let owner_id = identity.user_id.clone();
    let task = state
        .with_tasks(move |tasks| tasks.insert_task(&owner_id, new_task))
        .await?;
    info!(user_id = %identity.user_id, task_id = %task.id, "task created");

    let fire_at =
        state
            .reminders
            .schedule_for_new_task(task.clone(), Some(identity.email), Utc::now());
    if let Some(fire_at) = fire_at {
        debug!(task_id = %task.id, %fire_at, "reminder scheduled");
    }

    Ok((StatusCode::CREATED, Json(task)))
}

pub(super) async fn get_task(
    identity: Identity,
    State(state): State<AppState>,
    id: PathParam,
) -> Result<Json<Task>> {
    let Path(id) = id?;
    let task = state
        .with_tasks(move |tasks| tasks.get_task(&identity.user_id, &id))
        .await?;
    Ok(Json(task))
}

pub(super) async fn update_task(
    identity: Identity,
    State(state): State<AppState>,
    id: PathParam,
    payload: std::result::Result<Json<TaskPatch>, JsonRejection>,
) -> Result<Json<Task>> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    let patch = patch.normalized()?;
    let owner_id = identity.user_id.clone();
    let task = state
        .with_tasks(move |tasks| tasks.update_task(&owner_id, &id, patch))
        .await?;
    info!(user_id = %identity.user_id, task_id = %task.id, "task updated");
    Ok(Json(task))
}

pub(super) async fn delete_task(
    identity: Identity,
    State(state): State<AppState>,
    id: PathParam,
) -> Result<Json<Value>> {
    let Path(id) = id?;
    let owner_id = identity.user_id.clone();
    let task_id = id.clone();
    state
        .with_tasks(move |tasks| tasks.delete_task(&owner_id, &task_id))
        .await?;
    info!(user_id = %identity.user_id, task_id = %id, "task deleted");
    Ok(Json(json!({ "message": "Task deleted successfully" })))
}
