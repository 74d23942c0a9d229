//! HTTP API.
//!
//! Routes:
//! - `POST /register`, `POST /login` (open)
//! - `GET|POST /tasks`, `GET|PUT|DELETE /tasks/{id}` (owner-scoped)
//! - `GET /tasks/filter?period=day|week|month`, `/tasks/overdue`,
//!   `/tasks/category/{category}`, `/tasks/priority/{priority}`
//! - `GET /health`

mod accounts;
mod tasks;

pub use accounts::normalize_email;

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::FromRef;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::TokenService;
use crate::config::ServerConfig;
use crate::error::{Result, ServiceError};
use crate::scheduler::ReminderScheduler;
use crate::store::{StoreError, TaskStore, UserStore};

/// Process-wide handles shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub tokens: Arc<TokenService>,
    pub reminders: ReminderScheduler,
    pub min_password_len: usize,
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.tokens)
    }
}

/// Run blocking work (password hashing, SQLite calls) off the async
/// worker threads.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Internal(format!("blocking task failed: {e}")))
}

impl AppState {
    /// Run one task-store call on the blocking pool.
    pub(crate) async fn with_tasks<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn TaskStore) -> std::result::Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let tasks = Arc::clone(&self.tasks);
        Ok(run_blocking(move || f(tasks.as_ref())).await??)
    }

    /// Run one user-store call on the blocking pool.
    pub(crate) async fn with_users<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn UserStore) -> std::result::Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let users = Arc::clone(&self.users);
        Ok(run_blocking(move || f(users.as_ref())).await??)
    }
}

/// Build the application router with CORS, request tracing and panic
/// recovery applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(tasks::health))
        .route("/register", post(accounts::register))
        .route("/login", post(accounts::login))
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/tasks/filter", get(tasks::filter_tasks))
        .route("/tasks/overdue", get(tasks::overdue_tasks))
        .route("/tasks/category/{category}", get(tasks::tasks_by_category))
        .route("/tasks/priority/{priority}", get(tasks::tasks_by_priority))
        .route(
            "/tasks/{id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    ServiceError::Internal(format!("handler panicked: {detail}")).into_response()
}

/// Running HTTP server.
pub struct TaskServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TaskServer {
    /// Bind `{config.host}:{config.port}` (port `0` picks a free port) and
    /// serve in a background task.
    pub async fn start(state: AppState, config: &ServerConfig) -> Result<Self> {
        let app = router(state);

        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr).await?;
        let addr = listener.local_addr()?;
        info!("task service listening on http://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("task server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for TaskServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
