use std::io::Read;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use mdns_sd::{ServiceDaemon, ServiceInfo};
use serde::{Deserialize, Serialize};
use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::engine::runtime::RuntimeHandle;
use crate::engine::snapshot::{ScheduleRow, StatusSnapshot};
use crate::schedule::model::{DayKey, DepartmentTable};

pub const MDNS_SERVICE_TYPE: &str = "_bellschedule._tcp.local.";
const MAX_BODY_BYTES: u64 = 4096;

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub mdns_enabled: bool,
    pub mdns_instance: String,
}

struct ApiContext {
    snapshot: Arc<Mutex<StatusSnapshot>>,
    runtime: RuntimeHandle,
    departments: DepartmentTable,
}

pub struct ApiServer {
    local_port: u16,
    stop: Arc<AtomicBool>,
    http_join: Option<JoinHandle<()>>,
    mdns: Option<ServiceDaemon>,
}

impl ApiServer {
    pub fn start(
        config: ApiServerConfig,
        snapshot: Arc<Mutex<StatusSnapshot>>,
        runtime: RuntimeHandle,
        departments: DepartmentTable,
    ) -> Result<Self> {
        let bind = format!("{}:{}", config.bind_addr, config.port);
        let server =
            Server::http(&bind).map_err(|err| anyhow!("failed to start API server on {bind}: {err}"))?;
        let local_port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .unwrap_or(config.port);
        info!("admin API listening on {}:{local_port}", config.bind_addr);

        let context = ApiContext {
            snapshot,
            runtime,
            departments,
        };
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);
        let http_join = thread::Builder::new()
            .name("admin-api".to_string())
            .spawn(move || run_server_loop(server, context, stop_for_thread))
            .map_err(|err| anyhow!("failed to spawn API thread: {err}"))?;

        let mdns = if config.mdns_enabled {
            match start_mdns_advertisement(local_port, &config.mdns_instance) {
                Ok(daemon) => Some(daemon),
                Err(err) => {
                    warn!("mDNS advertisement disabled: {err:#}");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            local_port,
            stop,
            http_join: Some(http_join),
            mdns,
        })
    }

    #[cfg(test)]
    pub fn local_port(&self) -> u16 {
        self.local_port
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.http_join.take() {
            let _ = join.join();
        }
        debug!("admin API on port {} stopped", self.local_port);
        if let Some(mdns) = self.mdns.take() {
            let _ = mdns.shutdown();
        }
    }
}

fn run_server_loop(server: Server, context: ApiContext, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        match server.recv_timeout(Duration::from_millis(200)) {
            Ok(Some(request)) => handle_request(request, &context),
            Ok(None) => continue,
            Err(_) => continue,
        }
    }
}

fn start_mdns_advertisement(api_port: u16, instance_prefix: &str) -> Result<ServiceDaemon> {
    let daemon = ServiceDaemon::new().map_err(|err| anyhow!("could not create mDNS daemon: {err}"))?;

    let hostname = detect_hostname();
    let instance = if instance_prefix.trim().is_empty() {
        hostname.clone()
    } else {
        format!("{}-{}", instance_prefix.trim(), hostname)
    };
    let host_name = format!("{hostname}.local.");

    let service = ServiceInfo::new(MDNS_SERVICE_TYPE, &instance, &host_name, (), api_port, None)
        .map_err(|err| anyhow!("could not create mDNS service info: {err}"))?
        .enable_addr_auto();
    daemon
        .register(service)
        .map_err(|err| anyhow!("could not register mDNS service: {err}"))?;
    info!("advertising {instance} as {MDNS_SERVICE_TYPE}");
    Ok(daemon)
}

fn detect_hostname() -> String {
    let candidate = std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .unwrap_or_default();
    sanitize_hostname(&candidate)
}

fn sanitize_hostname(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "bellschedule".to_string();
    }
    trimmed
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' {
                ch.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

fn handle_request(mut request: tiny_http::Request, context: &ApiContext) {
    let Some(remote_ip) = request.remote_addr().map(|addr| addr.ip()) else {
        let _ = send_text(request, StatusCode(400), "missing remote address");
        return;
    };
    if !is_local_network_ip(remote_ip) {
        let _ = send_text(request, StatusCode(403), "forbidden: local network only");
        return;
    }

    let method = request.method().clone();
    let url = request.url().to_string();
    let path = split_path_query(&url).0;
    debug!("{method} {path} from {remote_ip}");

    match (&method, path) {
        (Method::Get, "/healthz") => {
            let _ = send_text(request, StatusCode(200), "ok");
        }
        (Method::Get, "/v1") => {
            #[derive(Serialize)]
            struct ApiIndexResponse {
                api_base: String,
                state_url: String,
                schedule_url: String,
                departments_url: String,
                override_url: String,
                sound_url: String,
                test_bell_url: String,
                health_url: String,
            }

            let base_url = request_base_url(&request);
            let payload = ApiIndexResponse {
                state_url: format!("{base_url}/v1/state"),
                schedule_url: format!("{base_url}/v1/schedule"),
                departments_url: format!("{base_url}/v1/departments"),
                override_url: format!("{base_url}/v1/override"),
                sound_url: format!("{base_url}/v1/sound"),
                test_bell_url: format!("{base_url}/v1/test-bell"),
                health_url: format!("{base_url}/healthz"),
                api_base: base_url,
            };
            let _ = send_json(request, StatusCode(200), &payload);
        }
        (Method::Get, "/" | "/v1/state") => match read_snapshot(context) {
            Some(snapshot) => {
                let _ = send_json(request, StatusCode(200), &snapshot);
            }
            None => {
                let _ = send_text(request, StatusCode(500), "internal state lock error");
            }
        },
        (Method::Get, "/v1/schedule") => {
            #[derive(Serialize)]
            struct ScheduleResponse {
                day: Option<DayKey>,
                override_day: Option<DayKey>,
                periods: Vec<ScheduleRow>,
            }

            match read_snapshot(context) {
                Some(snapshot) => {
                    let payload = ScheduleResponse {
                        day: snapshot.effective_day,
                        override_day: snapshot.override_day,
                        periods: snapshot.periods,
                    };
                    let _ = send_json(request, StatusCode(200), &payload);
                }
                None => {
                    let _ = send_text(request, StatusCode(500), "internal state lock error");
                }
            }
        }
        (Method::Get, "/v1/departments") => {
            let _ = send_json(request, StatusCode(200), &context.departments);
        }
        (Method::Put, "/v1/override") => {
            let body = match read_body(&mut request) {
                Ok(body) => body,
                Err(message) => {
                    let _ = send_text(request, StatusCode(400), message);
                    return;
                }
            };
            match parse_override_body(&body) {
                Ok(day) => forward_override(request, context, day),
                Err(message) => {
                    let _ = send_text(request, StatusCode(400), &message);
                }
            }
        }
        (Method::Delete, "/v1/override") => forward_override(request, context, None),
        (Method::Put, "/v1/sound") => {
            let body = match read_body(&mut request) {
                Ok(body) => body,
                Err(message) => {
                    let _ = send_text(request, StatusCode(400), message);
                    return;
                }
            };
            match parse_sound_body(&body) {
                Ok(enabled) => forward_sound(request, context, enabled),
                Err(message) => {
                    let _ = send_text(request, StatusCode(400), &message);
                }
            }
        }
        (Method::Post, "/v1/test-bell") => {
            #[derive(Serialize)]
            struct TestBellResponse {
                accepted: bool,
            }

            match context.runtime.test_bell() {
                Ok(()) => {
                    let _ = send_json(request, StatusCode(202), &TestBellResponse { accepted: true });
                }
                Err(err) => {
                    let _ = send_text(request, StatusCode(503), &err.to_string());
                }
            }
        }
        (
            _,
            "/" | "/healthz" | "/v1" | "/v1/state" | "/v1/schedule" | "/v1/departments"
            | "/v1/override" | "/v1/sound" | "/v1/test-bell",
        ) => {
            let _ = send_text(request, StatusCode(405), "method not allowed");
        }
        _ => {
            let _ = send_text(request, StatusCode(404), "not found");
        }
    }
}

fn read_snapshot(context: &ApiContext) -> Option<StatusSnapshot> {
    context.snapshot.lock().ok().map(|guard| guard.clone())
}

fn forward_override(request: tiny_http::Request, context: &ApiContext, day: Option<DayKey>) {
    #[derive(Serialize)]
    struct OverrideResponse {
        accepted: bool,
        override_day: Option<DayKey>,
    }

    match context.runtime.set_override(day) {
        Ok(()) => {
            let payload = OverrideResponse {
                accepted: true,
                override_day: day,
            };
            let _ = send_json(request, StatusCode(202), &payload);
        }
        Err(err) => {
            let _ = send_text(request, StatusCode(503), &err.to_string());
        }
    }
}

fn read_body(request: &mut tiny_http::Request) -> Result<String, &'static str> {
    let mut body = String::new();
    request
        .as_reader()
        .take(MAX_BODY_BYTES)
        .read_to_string(&mut body)
        .map_err(|_| "request body must be UTF-8")?;
    Ok(body)
}

fn forward_sound(request: tiny_http::Request, context: &ApiContext, enabled: bool) {
    #[derive(Serialize)]
    struct SoundResponse {
        accepted: bool,
        sound_enabled: bool,
    }

    match context.runtime.set_sound(enabled) {
        Ok(()) => {
            let payload = SoundResponse {
                accepted: true,
                sound_enabled: enabled,
            };
            let _ = send_json(request, StatusCode(202), &payload);
        }
        Err(err) => {
            let _ = send_text(request, StatusCode(503), &err.to_string());
        }
    }
}

#[derive(Debug, Deserialize)]
struct SoundRequest {
    enabled: bool,
}

fn parse_sound_body(body: &str) -> Result<bool, String> {
    serde_json::from_str::<SoundRequest>(body)
        .map(|parsed| parsed.enabled)
        .map_err(|err| {
            format!(
                "invalid JSON at line {}, column {}: {err}",
                err.line(),
                err.column()
            )
        })
}

#[derive(Debug, Deserialize)]
struct OverrideRequest {
    day: Option<String>,
}

fn parse_override_body(body: &str) -> Result<Option<DayKey>, String> {
    let parsed: OverrideRequest = serde_json::from_str(body).map_err(|err| {
        format!(
            "invalid JSON at line {}, column {}: {err}",
            err.line(),
            err.column()
        )
    })?;
    match parsed.day.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => DayKey::from_str(raw).map(Some).map_err(|err| err.to_string()),
    }
}

fn send_json<T: Serialize>(
    request: tiny_http::Request,
    status: StatusCode,
    body: &T,
) -> Result<()> {
    let payload = serde_json::to_vec(body)?;
    let content_type = Header::from_str("Content-Type: application/json; charset=utf-8")
        .map_err(|_| anyhow!("failed to build content-type header"))?;
    request.respond(
        Response::from_data(payload)
            .with_status_code(status)
            .with_header(content_type),
    )?;
    Ok(())
}

fn send_text(request: tiny_http::Request, status: StatusCode, body: &str) -> Result<()> {
    let content_type = Header::from_str("Content-Type: text/plain; charset=utf-8")
        .map_err(|_| anyhow!("failed to build content-type header"))?;
    request.respond(
        Response::from_string(body.to_string())
            .with_status_code(status)
            .with_header(content_type),
    )?;
    Ok(())
}

fn split_path_query(url: &str) -> (&str, &str) {
    match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    }
}

fn request_base_url(request: &tiny_http::Request) -> String {
    for header in request.headers() {
        if header.field.equiv("Host") {
            let host = header.value.as_str().trim();
            if !host.is_empty() {
                return format!("http://{host}");
            }
        }
    }
    "http://127.0.0.1:8099".to_string()
}

fn is_local_network_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unique_local()
                || v6.is_unicast_link_local()
                || is_ipv4_mapped_local(v6)
        }
    }
}

fn is_ipv4_mapped_local(v6: Ipv6Addr) -> bool {
    match v6.to_ipv4_mapped() {
        Some(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        None => false,
    }
}
