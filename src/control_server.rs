use std::sync::Arc;
use std::thread;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tiny_http::{Method, Request, Response, Server};
use tokio::runtime::Handle;
use url::Url;

use crate::commands;
use crate::discord::metadata;
use crate::presence::{Activity, SessionManager};
use crate::settings::{AppSettings, DefaultPreset, Profile, SettingsStore};

/// CORS headers so a locally served front end can call the server
fn cors_headers() -> Vec<tiny_http::Header> {
    [
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"),
        ("Access-Control-Allow-Headers", "Content-Type"),
    ]
    .into_iter()
    .filter_map(|(name, value)| tiny_http::Header::from_bytes(name, value).ok())
    .collect()
}

/// Helper to create a JSON response with CORS headers
fn json_response(status: u16, body: &Value) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut response = Response::from_string(body.to_string()).with_status_code(status);

    if let Ok(header) = tiny_http::Header::from_bytes("Content-Type", "application/json") {
        response.add_header(header);
    }
    for header in cors_headers() {
        response.add_header(header);
    }

    response
}

/// Helper to create an empty response for OPTIONS preflight requests
fn preflight_response() -> Response<std::io::Empty> {
    let mut response = Response::empty(204);
    for header in cors_headers() {
        response.add_header(header);
    }
    response
}

type Reply = (u16, Value);

fn error_reply(status: u16, message: impl std::fmt::Display) -> Reply {
    (status, json!({ "error": message.to_string() }))
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, Reply> {
    serde_json::from_str(body).map_err(|e| error_reply(400, format!("Invalid request body: {}", e)))
}

fn to_value(value: impl serde::Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[derive(Debug, Default, Deserialize)]
struct ConnectRequest {
    identifier: Option<String>,
}

/// Everything a request handler needs
#[derive(Clone)]
pub struct ControlContext {
    pub session: SessionManager,
    pub store: Arc<SettingsStore>,
    pub runtime: Handle,
}

pub struct ControlServer {
    pub port: u16,
    server: Arc<Server>,
}

impl ControlServer {
    pub fn start(port: u16, context: ControlContext) -> Result<Self, String> {
        let server = Server::http(("127.0.0.1", port))
            .map_err(|e| format!("Failed to start control server: {}", e))?;

        let port = server
            .server_addr()
            .to_ip()
            .ok_or("Failed to get server address")?
            .port();

        tracing::info!("Control server started on port {}", port);

        let server = Arc::new(server);
        let listener = Arc::clone(&server);
        thread::spawn(move || Self::run_server(&listener, &context));

        Ok(Self { port, server })
    }

    /// Stop accepting requests and let the server thread exit
    pub fn stop(&self) {
        tracing::info!("Stopping control server");
        self.server.unblock();
    }

    /// One thread per request; a pending connect must not block other routes
    fn run_server(server: &Server, context: &ControlContext) {
        for request in server.incoming_requests() {
            let context = context.clone();
            thread::spawn(move || Self::serve(request, &context));
        }

        tracing::debug!("Control server loop finished");
    }

    fn serve(mut request: Request, context: &ControlContext) {
        // Handle CORS preflight requests
        if request.method() == &Method::Options {
            request.respond(preflight_response()).ok();
            return;
        }

        let mut body = String::new();
        if let Err(e) = request.as_reader().read_to_string(&mut body) {
            let (status, value) = error_reply(400, format!("Failed to read request body: {}", e));
            request.respond(json_response(status, &value)).ok();
            return;
        }

        let method = request.method().clone();
        let (status, value) = handle_request(context, &method, request.url(), &body);
        tracing::debug!("{} {} -> {}", method, request.url(), status);
        request.respond(json_response(status, &value)).ok();
    }
}

fn handle_request(context: &ControlContext, method: &Method, raw_url: &str, body: &str) -> Reply {
    let full_url = format!("http://127.0.0.1{}", raw_url);
    let url = match Url::parse(&full_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("Failed to parse control server URL: {}", e);
            return error_reply(400, e);
        }
    };

    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    route(context, method, &segments, body).unwrap_or_else(|reply| reply)
}

fn route(
    context: &ControlContext,
    method: &Method,
    segments: &[&str],
    body: &str,
) -> Result<Reply, Reply> {
    let session = &context.session;
    let store = &context.store;
    let runtime = &context.runtime;

    let reply = match (method, segments) {
        (Method::Get, ["status"]) => (200, to_value(commands::get_status(session))),

        (Method::Post, ["connect"]) => {
            let request: ConnectRequest = if body.trim().is_empty() {
                ConnectRequest::default()
            } else {
                parse_body(body)?
            };
            let result = runtime.block_on(commands::connect(session, request.identifier.as_deref()));
            if result.success {
                if let Some(identifier) = session.identifier() {
                    if let Err(e) = store.set_last_identifier(&identifier) {
                        tracing::warn!("Failed to remember identifier: {}", e);
                    }
                }
            }
            (200, to_value(result))
        }

        (Method::Post, ["disconnect"]) => (200, to_value(runtime.block_on(commands::disconnect(session)))),

        (Method::Post, ["activity"]) => {
            let activity: Activity = parse_body(body)?;
            (200, to_value(runtime.block_on(commands::set_activity(session, activity))))
        }

        (Method::Delete, ["activity"]) => {
            (200, to_value(runtime.block_on(commands::clear_activity(session))))
        }

        (Method::Get, ["settings"]) => (200, to_value(store.settings())),

        (Method::Put, ["settings"]) => {
            let settings: AppSettings = parse_body(body)?;
            let saved = store.save_settings(settings).map_err(|e| error_reply(500, e))?;
            (200, to_value(saved))
        }

        (Method::Get, ["profiles"]) => (200, to_value(store.profiles())),

        (Method::Post, ["profiles"]) => {
            let profile: Profile = parse_body(body)?;
            let saved = store.save_profile(profile).map_err(|e| error_reply(500, e))?;
            (200, to_value(saved))
        }

        (Method::Delete, ["profiles", id]) => {
            let deleted = store.delete_profile(id).map_err(|e| error_reply(500, e))?;
            (200, json!({ "deleted": deleted }))
        }

        (Method::Get, ["default"]) => (200, to_value(store.default_preset())),

        (Method::Put, ["default"]) => {
            let preset: DefaultPreset = parse_body(body)?;
            store.save_default_preset(preset).map_err(|e| error_reply(500, e))?;
            (200, json!({ "saved": true }))
        }

        (Method::Delete, ["default"]) => {
            store.clear_default_preset().map_err(|e| error_reply(500, e))?;
            (200, json!({ "cleared": true }))
        }

        (Method::Get, ["apps", id]) => {
            let info = runtime.block_on(metadata::fetch_app_info(id));
            (200, app_info_json(info))
        }

        (Method::Get, ["apps", id, "assets"]) => {
            let assets = runtime.block_on(metadata::fetch_assets(id));
            (200, assets_json(id, assets))
        }

        _ => error_reply(404, "Not found"),
    };

    Ok(reply)
}

fn app_info_json(info: Option<metadata::AppInfo>) -> Value {
    match info {
        Some(info) => {
            let icon_url = info
                .icon
                .as_deref()
                .map(|hash| metadata::app_icon_url(&info.id, hash));
            let mut value = to_value(&info);
            value["iconUrl"] = to_value(icon_url);
            value
        }
        None => Value::Null,
    }
}

fn assets_json(app_id: &str, assets: Vec<metadata::Asset>) -> Value {
    assets
        .into_iter()
        .map(|asset| {
            let url = metadata::asset_url(app_id, &asset.id);
            let mut value = to_value(&asset);
            value["url"] = Value::String(url);
            value
        })
        .collect()
}
