//! Preview server. The page is compiled again for every request, and open
//! tabs reload when anything under the page directory changes.

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path as UrlPath, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use notify::{Event, RecursiveMode, Watcher};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, MissedTickBehavior};

const RELOAD_ROUTE: &str = "/__sitecraft_ws";
const SWEEP_INTERVAL: Duration = Duration::from_millis(1500);
const SETTLE_WINDOW: Duration = Duration::from_millis(120);

struct Preview {
    page: PathBuf,
    root: PathBuf,
    live_reload: bool,
    /// Bumped whenever the page directory changes.
    reload: watch::Sender<u64>,
}

pub(crate) async fn run_server(page: PathBuf, port: u16, live_reload: bool) -> Result<(), String> {
    let page = page
        .canonicalize()
        .map_err(|e| format!("failed to resolve {}: {e}", page.display()))?;
    let root = page
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| format!("{} has no parent directory", page.display()))?;

    // A page that is broken at startup is a hard error; later breakage is
    // reported in the browser.
    let first = page.clone();
    tokio::task::spawn_blocking(move || crate::render_page(&first))
        .await
        .map_err(|e| format!("render task failed: {e}"))??;

    let preview = Arc::new(Preview {
        page,
        root,
        live_reload,
        reload: watch::channel(0).0,
    });

    if live_reload {
        tokio::spawn(watch_page_dir(Arc::clone(&preview)));
    }

    let app = Router::new()
        .route(RELOAD_ROUTE, get(reload_socket))
        .route("/", get(page_route))
        .route("/{*path}", get(asset_route))
        .with_state(Arc::clone(&preview));

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("failed to bind {addr}: {e}"))?;
    tracing::info!(
        "[sitecraft:serve] {} on http://localhost:{port} (live reload {})",
        preview.page.display(),
        if live_reload { "on" } else { "off" }
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("server failed: {e}"))
}

async fn page_route(State(preview): State<Arc<Preview>>) -> Response {
    let page = preview.page.clone();
    let rendered = match tokio::task::spawn_blocking(move || crate::render_page(&page)).await {
        Ok(result) => result,
        Err(e) => Err(format!("render task failed: {e}")),
    };

    let (status, html) = match rendered {
        Ok(html) => (StatusCode::OK, html),
        Err(err) => {
            tracing::error!("[sitecraft:serve] {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, error_page(&err))
        }
    };
    let html = if preview.live_reload {
        inject_reload_script(html)
    } else {
        html
    };
    (status, Html(html)).into_response()
}

async fn asset_route(
    UrlPath(requested): UrlPath<String>,
    State(preview): State<Arc<Preview>>,
) -> Response {
    let Some(path) = asset_path(&preview.root, &requested) else {
        return (StatusCode::BAD_REQUEST, "invalid path").into_response();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, mime_type(&path))], bytes).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
        Err(e) => {
            tracing::warn!("[sitecraft:serve] {}: {e}", path.display());
            (StatusCode::INTERNAL_SERVER_ERROR, "unreadable file").into_response()
        }
    }
}

async fn reload_socket(ws: WebSocketUpgrade, State(preview): State<Arc<Preview>>) -> Response {
    let versions = preview.reload.subscribe();
    ws.on_upgrade(move |socket| push_reloads(socket, versions))
}

/// Sends the current version on connect and every new one after that. The
/// client reloads when the number it sees changes.
async fn push_reloads(mut socket: WebSocket, mut versions: watch::Receiver<u64>) {
    let current = *versions.borrow_and_update();
    if socket.send(Message::Text(current.to_string().into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            changed = versions.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = *versions.borrow_and_update();
                if socket.send(Message::Text(next.to_string().into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

/// Filesystem events wake the loop early; the periodic sweep covers
/// platforms where the watcher cannot start.
async fn watch_page_dir(preview: Arc<Preview>) {
    let (tx, mut events) = mpsc::unbounded_channel::<()>();
    let root = preview.root.clone();
    let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let relevant = res.map_or(true, |event| {
            event
                .paths
                .iter()
                .any(|path| !is_ignored(path.strip_prefix(&root).unwrap_or(path)))
        });
        if relevant {
            let _ = tx.send(());
        }
    })
    .and_then(|mut watcher| {
        watcher
            .watch(&preview.root, RecursiveMode::Recursive)
            .map(|()| watcher)
    });
    let watcher = match watcher {
        Ok(watcher) => Some(watcher),
        Err(err) => {
            tracing::warn!("[sitecraft:watch] watcher unavailable ({err}); polling");
            None
        }
    };

    let mut last = fingerprint(&preview.root);
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = sweep.tick() => {}
            Some(()) = events.recv(), if watcher.is_some() => settle(&mut events).await,
        }

        let root = preview.root.clone();
        let Ok(now) = tokio::task::spawn_blocking(move || fingerprint(&root)).await else {
            continue;
        };
        if now != last {
            last = now;
            preview.reload.send_modify(|version| *version += 1);
            tracing::info!(
                "[sitecraft:watch] change detected, reload #{}",
                *preview.reload.borrow()
            );
        }
    }
}

/// Waits until no event has arrived for one settle window.
async fn settle(events: &mut mpsc::UnboundedReceiver<()>) {
    while let Ok(Some(())) = tokio::time::timeout(SETTLE_WINDOW, events.recv()).await {}
}

fn is_ignored(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            name.starts_with('.') || name == "target" || name == "node_modules"
        }
        _ => false,
    })
}

/// Hash of every relative path and file body under `root`.
fn fingerprint(root: &Path) -> u64 {
    fn collect(dir: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path
                .file_name()
                .is_some_and(|name| is_ignored(Path::new(name)))
            {
                continue;
            }
            match entry.file_type() {
                Ok(kind) if kind.is_dir() => collect(&path, out),
                Ok(kind) if kind.is_file() => out.push(path),
                _ => {}
            }
        }
    }

    let mut files = Vec::new();
    collect(root, &mut files);
    files.sort();

    let mut hasher = DefaultHasher::new();
    for path in &files {
        path.strip_prefix(root).unwrap_or(path).hash(&mut hasher);
        fs::read(path).unwrap_or_default().hash(&mut hasher);
    }
    hasher.finish()
}

/// Resolves a request path under `root`. Only plain path segments are
/// accepted.
fn asset_path(root: &Path, requested: &str) -> Option<PathBuf> {
    let rel = Path::new(requested.trim_start_matches('/'));
    let mut parts = rel.components().peekable();
    parts.peek()?;
    if parts.all(|c| matches!(c, Component::Normal(_))) {
        Some(root.join(rel))
    } else {
        None
    }
}

fn mime_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

fn error_page(err: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Build failed</title></head>\
         <body><h1>Build failed</h1><pre>{}</pre></body></html>",
        sitecraft_web::escape_text(err)
    )
}

/// Adds the reload client before `</body>`. Idempotent.
fn inject_reload_script(mut html: String) -> String {
    if html.contains(RELOAD_ROUTE) {
        return html;
    }
    let client = format!(
        "<script>(function(){{var seen=null;\
         function connect(){{\
         var ws=new WebSocket((location.protocol===\"https:\"?\"wss://\":\"ws://\")+location.host+\"{RELOAD_ROUTE}\");\
         ws.onmessage=function(e){{if(seen!==null&&e.data!==seen){{location.reload();}}seen=e.data;}};\
         ws.onclose=function(){{setTimeout(connect,1000);}};\
         }}connect();}})();</script>"
    );
    match html.rfind("</body>") {
        Some(at) => html.insert_str(at, &client),
        None => html.push_str(&client),
    }
    html
}
