//! Development server implementation.

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::services::ServeDir;

use kiln_tasks::TaskGraph;

use crate::watcher::{FileWatcher, Reload, WatchEvent, WatchRule};
use crate::websocket::{
    client_script, inject_client, ReloadHub, ReloadMessage, CLIENT_PATH, RELOAD_PATH,
};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Directory served and watched
    pub root: PathBuf,

    /// Directory under `root` that `/` maps to, where the pages live.
    /// Paths it does not hold fall through to `root`.
    pub pages: PathBuf,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,

    /// What to do when watched files change
    pub rules: Vec<WatchRule>,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            pages: PathBuf::from("."),
            port: 3000,
            host: "127.0.0.1".to_string(),
            open: true,
            rules: Vec::new(),
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    AddressError(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),
}

/// Shared server state.
struct ServerState {
    root: PathBuf,
    pages: PathBuf,
    hub: ReloadHub,
}

/// Development server with live reload.
pub struct DevServer {
    config: DevServerConfig,
    hub: ReloadHub,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(config: DevServerConfig) -> Self {
        Self {
            config,
            hub: ReloadHub::new(),
        }
    }

    /// Hub used to notify connected browsers.
    pub fn hub(&self) -> &ReloadHub {
        &self.hub
    }

    /// Address the server binds to.
    pub fn addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        addr.parse().map_err(|_| ServerError::AddressError(addr))
    }

    /// Serve and watch until the process is terminated.
    ///
    /// Matching file changes run the rule's task on `graph` and then notify
    /// browsers. Each change spawns its own run, so rapid edits may overlap.
    pub async fn start(self, graph: Arc<TaskGraph>) -> Result<(), ServerError> {
        let addr = self.addr()?;

        let (watcher, mut rx) = FileWatcher::new(&self.config.root, &self.config.rules)
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let rules = Arc::new(self.config.rules.clone());
        let hub = self.hub.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                tokio::spawn(handle_watch_event(
                    Arc::clone(&graph),
                    Arc::clone(&rules),
                    hub.clone(),
                    event,
                ));
            }
            // Keep watcher alive
            drop(watcher);
        });

        let app = router(&self.config.root, &self.config.pages, self.hub.clone());

        tracing::info!(
            "Serving {} at http://{}",
            self.config.root.join(&self.config.pages).display(),
            addr
        );

        if self.config.open {
            let url = format!("http://{}", addr);
            let _ = open::that(&url);
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

/// Build the router serving `root` with live reload.
///
/// `/` maps to `root/pages`; anything that directory lacks, such as
/// `/dist/css/main.css`, is looked up under `root`.
pub fn router(root: &Path, pages: &Path, hub: ReloadHub) -> Router {
    let state = Arc::new(ServerState {
        root: root.to_path_buf(),
        pages: root.join(pages),
        hub,
    });

    Router::new()
        .route(RELOAD_PATH, get(ws_handler))
        .route(CLIENT_PATH, get(client_script_handler))
        .fallback(static_handler)
        .with_state(state)
}

/// Run the rule's task, then tell browsers what changed.
async fn handle_watch_event(
    graph: Arc<TaskGraph>,
    rules: Arc<Vec<WatchRule>>,
    hub: ReloadHub,
    event: WatchEvent,
) {
    let Some(rule) = rules.get(event.rule) else {
        return;
    };

    tracing::info!("Changed: {}", event.path.display());

    if let Some(task) = &rule.task {
        if let Err(e) = graph.run(task).await {
            tracing::error!("{}", e);
            return;
        }
    }

    match rule.reload {
        Reload::Full => hub.send(ReloadMessage::Reload),
        Reload::Css => hub.send(ReloadMessage::Css),
        Reload::None => {}
    }
}

/// Serve files, injecting the live-reload client into pages.
async fn static_handler(State(state): State<Arc<ServerState>>, req: Request) -> Response {
    let dir = serving_dir(&state, req.uri().path());

    if let Some(page) = html_page(dir, req.uri().path()) {
        match tokio::fs::read_to_string(&page).await {
            Ok(html) => return Html(inject_client(&html)).into_response(),
            Err(e) => tracing::warn!("Failed to read {}: {}", page.display(), e),
        }
    }

    match ServeDir::new(dir).try_call(req).await {
        Ok(response) => response.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// The pages directory when it holds the request path, otherwise the root.
fn serving_dir<'a>(state: &'a ServerState, uri_path: &str) -> &'a Path {
    match local_path(&state.pages, uri_path) {
        Some(path) if path.exists() => &state.pages,
        _ => &state.root,
    }
}

/// Map a request path into `dir`. Paths that try to leave it map to nothing.
fn local_path(dir: &Path, uri_path: &str) -> Option<PathBuf> {
    let relative = Path::new(uri_path.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(dir.join(relative))
}

/// Resolve a request path to an HTML file under `dir`.
///
/// Directory requests resolve to their `index.html`.
fn html_page(dir: &Path, uri_path: &str) -> Option<PathBuf> {
    let mut path = local_path(dir, uri_path)?;
    if uri_path.ends_with('/') || path.is_dir() {
        path = path.join("index.html");
    }

    let is_html = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "html" || e == "htm");

    (is_html && path.is_file()).then_some(path)
}

/// Handler for the live-reload WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Forward reload messages to one browser.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    if send_message(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    while let Ok(msg) = rx.recv().await {
        if send_message(&mut socket, &msg).await.is_err() {
            break;
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

/// Handler for the live-reload client script.
async fn client_script_handler() -> impl IntoResponse {
    ([("content-type", "application/javascript")], client_script())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::tempdir;

    #[test]
    fn creates_server_with_default_config() {
        let server = DevServer::new(DevServerConfig::default());

        assert_eq!(server.config.port, 3000);
        assert_eq!(server.addr().unwrap().to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn rejects_bad_host() {
        let server = DevServer::new(DevServerConfig {
            host: "not a host".to_string(),
            ..Default::default()
        });

        assert!(matches!(server.addr(), Err(ServerError::AddressError(_))));
    }

    #[test]
    fn resolves_html_pages() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("docs")).unwrap();
        fs::write(temp.path().join("index.html"), "<html></html>").unwrap();
        fs::write(temp.path().join("docs/index.html"), "<html></html>").unwrap();
        fs::write(temp.path().join("app.js"), "").unwrap();

        assert_eq!(html_page(temp.path(), "/"), Some(temp.path().join("index.html")));
        assert_eq!(
            html_page(temp.path(), "/docs"),
            Some(temp.path().join("docs/index.html"))
        );
        assert_eq!(html_page(temp.path(), "/app.js"), None);
        assert_eq!(html_page(temp.path(), "/missing.html"), None);
        assert_eq!(html_page(temp.path(), "/../index.html"), None);
    }

    async fn serve(root: &Path, pages: &str) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(root, Path::new(pages), ReloadHub::new());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    #[tokio::test]
    async fn landing_page_comes_from_pages_dir() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::create_dir_all(temp.path().join("dist/css")).unwrap();
        fs::write(
            temp.path().join("src/index.html"),
            "<html><body><h1>home</h1></body></html>",
        )
        .unwrap();
        fs::write(temp.path().join("dist/css/main.css"), "h1{color:red}").unwrap();

        let addr = serve(temp.path(), "src").await;

        let landing = reqwest::get(format!("http://{}/", addr)).await.unwrap();
        assert_eq!(landing.status(), reqwest::StatusCode::OK);
        let body = landing.text().await.unwrap();
        assert!(body.contains("<h1>home</h1>"));
        assert!(body.contains(CLIENT_PATH));

        let css = reqwest::get(format!("http://{}/dist/css/main.css", addr))
            .await
            .unwrap();
        assert_eq!(css.status(), reqwest::StatusCode::OK);
        assert_eq!(css.text().await.unwrap(), "h1{color:red}");

        let missing = reqwest::get(format!("http://{}/nope.html", addr))
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[test]
    fn pages_dir_cannot_be_escaped() {
        let temp = tempdir().unwrap();
        let state = ServerState {
            root: temp.path().to_path_buf(),
            pages: temp.path().join("src"),
            hub: ReloadHub::new(),
        };

        assert_eq!(serving_dir(&state, "/../secret"), temp.path());
        assert_eq!(local_path(&state.pages, "/../secret"), None);
    }

    #[tokio::test]
    async fn change_runs_task_then_reloads() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut graph = TaskGraph::new();
        let counter = Arc::clone(&runs);
        graph
            .declare("compile:scss", &[], move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .unwrap();

        let rules = Arc::new(vec![WatchRule::new(
            "src/scss/**/*.scss",
            Some("compile:scss"),
            Reload::Css,
        )
        .unwrap()]);
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        handle_watch_event(
            Arc::new(graph),
            rules,
            hub,
            WatchEvent {
                rule: 0,
                path: PathBuf::from("src/scss/main.scss"),
            },
        )
        .await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_recv().unwrap(), ReloadMessage::Css);
    }

    #[tokio::test]
    async fn failed_task_skips_reload() {
        let mut graph = TaskGraph::new();
        graph
            .declare("compile:es6", &[], |_| async {
                Err::<(), kiln_tasks::ActionError>("boom".into())
            })
            .unwrap();

        let rules = Arc::new(vec![WatchRule::new(
            "src/js/**/*.js",
            Some("compile:es6"),
            Reload::Full,
        )
        .unwrap()]);
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        handle_watch_event(
            Arc::new(graph),
            rules,
            hub,
            WatchEvent {
                rule: 0,
                path: PathBuf::from("src/js/app.js"),
            },
        )
        .await;

        assert!(rx.try_recv().is_err());
    }
}
