//! IPC message dispatch — parse s-expressions and route to handlers.
//!
//! Point payloads arrive as plists per point: a `points-submit` message
//! looks like `(:type :points-submit :id 3 :points ((:x 120.5 :y 88.0
//! :t 1700) ...))` with `:t` the capture time in milliseconds.

use crate::recognizer::{BlendConfig, Point, ResultMode};
use crate::state::EngineState;
use lexpr::Value;
use tracing::{debug, warn};

/// Parse an s-expression message and dispatch to the appropriate handler.
/// Returns an optional response string (s-expression).
pub fn handle_message(state: &mut EngineState, client_id: u64, raw: &str) -> Option<String> {
    let value = match lexpr::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(client_id, "malformed s-expression: {}", e);
            return Some(error_response(0, &format!("malformed s-expression: {e}")));
        }
    };

    let msg_type = get_keyword(&value, "type");
    let msg_id = get_int(&value, "id").unwrap_or(0);

    // Everything except hello requires a completed handshake.
    let authenticated = state
        .ipc_server
        .clients
        .get(&client_id)
        .is_some_and(|c| c.authenticated);

    match msg_type.as_deref() {
        Some("hello") => handle_hello(state, client_id, msg_id, &value),
        _ if !authenticated => Some(error_response(msg_id, "hello handshake required")),
        Some("ping") => handle_ping(msg_id, &value),
        // Gesture session
        Some("points-submit") => handle_points_submit(state, msg_id, &value),
        Some("session-clear") => handle_session_clear(state, msg_id),
        Some("result-get") => handle_result_get(state, msg_id),
        Some("session-status") => handle_session_status(state, msg_id),
        // Engine state and tunables
        Some("engine-status") => handle_engine_status(state, msg_id),
        Some("engine-config") => handle_engine_config(state, msg_id),
        Some("config-set-pause") => handle_config_set_pause(state, msg_id, &value),
        Some("config-set-tick") => handle_config_set_tick(state, msg_id, &value),
        // Recognition surfaces
        Some("templates-list") => handle_templates_list(state, msg_id),
        Some("recognize") => handle_recognize(state, msg_id, &value),
        // IPC security
        Some("ipc-client-info") => handle_ipc_client_info(state, client_id, msg_id),
        Some("ipc-rate-limit") => handle_ipc_rate_limit(state, client_id, msg_id, &value),
        Some(other) => Some(error_response(
            msg_id,
            &format!("unknown message type: {other}"),
        )),
        None => Some(error_response(msg_id, "missing :type field")),
    }
}

// ── Handshake and liveness ──────────────────────────────────

fn handle_hello(
    state: &mut EngineState,
    client_id: u64,
    msg_id: i64,
    value: &Value,
) -> Option<String> {
    match get_int(value, "version") {
        Some(1) => {}
        other => {
            let v = other.unwrap_or(0);
            return Some(error_response(msg_id, &format!("unsupported protocol version: {v}")));
        }
    }

    // Only the user running the engine may drive it.
    let Some(client) = state.ipc_server.clients.get_mut(&client_id) else {
        return Some(error_response(msg_id, "client not found"));
    };
    if let Some(peer_uid) = client.peer_uid {
        let our_uid = unsafe { libc::getuid() };
        if peer_uid != our_uid {
            warn!(client_id, peer_uid, our_uid, "rejecting client: UID mismatch");
            return Some(error_response(msg_id, "authentication failed: UID mismatch"));
        }
    }
    client.authenticated = true;
    let peer_pid = client.peer_pid;

    let client_name = get_string(value, "client").unwrap_or_default();
    debug!(client_id, client_name, "hello handshake (authenticated)");

    let neural = if state.recognizer.has_neural() { "t" } else { "nil" };
    let pid_field = peer_pid.map(|p| format!(" :peer-pid {p}")).unwrap_or_default();
    Some(format!(
        "(:type :hello :id {msg_id} :version 1 :server \"airglyph-engine\" \
         :features (:neural {neural} :template-variants {}){pid_field})",
        state.recognizer.templates().template_count(),
    ))
}

fn handle_ping(msg_id: i64, value: &Value) -> Option<String> {
    let client_ts = get_int(value, "timestamp").unwrap_or(0);
    let server_ts = crate::state::unix_millis();
    Some(format!(
        "(:type :response :id {msg_id} :status :ok \
         :client-timestamp {client_ts} :server-timestamp {server_ts})"
    ))
}

// ── Gesture session handlers ────────────────────────────────

fn handle_points_submit(state: &mut EngineState, msg_id: i64, value: &Value) -> Option<String> {
    let points = match parse_points(value, "points") {
        Ok(p) => p,
        Err(reason) => return Some(error_response(msg_id, &reason)),
    };

    // A finalized session silently drops the batch: not an error,
    // the client just sees :accepted 0 until auto-clear fires.
    let accepted = if state.submit_points(&points) {
        points.len()
    } else {
        0
    };
    Some(format!(
        "(:type :response :id {} :status :ok :accepted {} :mode :{})",
        msg_id,
        accepted,
        state.session.mode().as_str()
    ))
}

fn handle_session_clear(state: &mut EngineState, msg_id: i64) -> Option<String> {
    state.clear_session();
    Some(format!(
        "(:type :response :id {} :status :ok :generation {})",
        msg_id,
        state.session.generation()
    ))
}

fn handle_result_get(state: &mut EngineState, msg_id: i64) -> Option<String> {
    let result = state.current_prediction();
    Some(format!(
        "(:type :response :id {} :status :ok :result {})",
        msg_id,
        result.to_sexp()
    ))
}

fn handle_session_status(state: &mut EngineState, msg_id: i64) -> Option<String> {
    let status = state.session.status_sexp(crate::state::unix_millis());
    Some(format!(
        "(:type :response :id {} :status :ok :session {})",
        msg_id, status
    ))
}

// ── Engine handlers ─────────────────────────────────────────

fn handle_engine_status(state: &mut EngineState, msg_id: i64) -> Option<String> {
    let status = state.engine_status_sexp();
    Some(format!(
        "(:type :response :id {} :status :ok :engine {})",
        msg_id, status
    ))
}

fn handle_engine_config(state: &mut EngineState, msg_id: i64) -> Option<String> {
    let session = state.session.config_sexp();
    let blend = blend_config_sexp(&state.recognizer.blend_config);
    Some(format!(
        "(:type :response :id {} :status :ok :session {} :blend {})",
        msg_id, session, blend
    ))
}

fn handle_config_set_pause(state: &mut EngineState, msg_id: i64, value: &Value) -> Option<String> {
    let pause = match get_int(value, "pause-ms") {
        Some(p) if (400..=2000).contains(&p) => p as u64,
        _ => return Some(error_response(msg_id, "invalid :pause-ms (400-2000)")),
    };

    state.session.config.pause_threshold_ms = pause;
    debug!(pause, "pause threshold updated");
    Some(format!(
        "(:type :response :id {} :status :ok :pause-ms {})",
        msg_id, pause
    ))
}

fn handle_config_set_tick(state: &mut EngineState, msg_id: i64, value: &Value) -> Option<String> {
    let tick = match get_int(value, "tick-ms") {
        Some(t) if (100..=1000).contains(&t) => t as u64,
        _ => return Some(error_response(msg_id, "invalid :tick-ms (100-1000)")),
    };

    // The recurring tick timer re-arms itself from config, so the new
    // interval takes effect on the next fire.
    state.session.config.tick_interval_ms = tick;
    debug!(tick, "tick interval updated");
    Some(format!(
        "(:type :response :id {} :status :ok :tick-ms {})",
        msg_id, tick
    ))
}

// ── Recognition handlers ────────────────────────────────────

fn handle_templates_list(state: &mut EngineState, msg_id: i64) -> Option<String> {
    let matcher = state.recognizer.templates();
    Some(format!(
        "(:type :response :id {} :status :ok :count {} :templates {})",
        msg_id,
        matcher.template_count(),
        matcher.library_sexp()
    ))
}

/// One-shot classification of supplied points, bypassing the session.
/// Lets a client probe the pipeline without driving the timers.
fn handle_recognize(state: &mut EngineState, msg_id: i64, value: &Value) -> Option<String> {
    let points = match parse_points(value, "points") {
        Ok(p) => p,
        Err(reason) => return Some(error_response(msg_id, &reason)),
    };

    let outcome = state.recognizer.recognize(&points, ResultMode::Live);
    Some(format!(
        "(:type :response :id {} :status :ok :result {} :degraded {})",
        msg_id,
        outcome.prediction.to_sexp(),
        if outcome.degraded { "t" } else { "nil" }
    ))
}

// ── IPC security handlers ───────────────────────────────────

fn handle_ipc_client_info(state: &mut EngineState, client_id: u64, msg_id: i64) -> Option<String> {
    let Some(client) = state.ipc_server.clients.get(&client_id) else {
        return Some(error_response(msg_id, "client not found"));
    };
    let uid = opt_field(client.peer_uid);
    let pid = opt_field(client.peer_pid);
    Some(format!(
        "(:type :response :id {msg_id} :status :ok :client-id {client_id} \
         :peer-uid {uid} :peer-pid {pid} :authenticated t :rate-limit {})",
        client.budget.max_per_second
    ))
}

fn handle_ipc_rate_limit(
    state: &mut EngineState,
    client_id: u64,
    msg_id: i64,
    value: &Value,
) -> Option<String> {
    let limit = match get_int(value, "limit") {
        Some(n) if (1..=10000).contains(&n) => n as u32,
        Some(_) => return Some(error_response(msg_id, "limit must be 1-10000")),
        None => return Some(error_response(msg_id, "missing :limit parameter")),
    };

    if let Some(client) = state.ipc_server.clients.get_mut(&client_id) {
        client.budget.max_per_second = limit;
        debug!(client_id, limit, "rate limit updated");
    }
    Some(ok_response(msg_id))
}

/// `nil` for a missing optional field, the value otherwise.
fn opt_field<T: std::fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "nil".to_string())
}

// ── Helpers ────────────────────────────────────────────────

fn ok_response(id: i64) -> String {
    format!("(:type :response :id {id} :status :ok)")
}

fn error_response(id: i64, reason: &str) -> String {
    format!(
        "(:type :response :id {id} :status :error :reason \"{}\")",
        escape_string(reason)
    )
}

/// Escape backslashes and quotes for s-expression string output.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Find the raw value stored under `:key` in an s-expression plist.
/// Walks cons pairs directly.  Handles both `Value::Keyword("key")`
/// (elisp parser) and `Value::Symbol(":key")` (default parser) forms.
fn get_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let prefixed = format!(":{key}");
    let mut current = value;
    while let Value::Cons(pair) = current {
        let car = pair.car();
        let is_key = match car {
            Value::Keyword(k) => k.as_ref() == key,
            Value::Symbol(s) => s.as_ref() == prefixed,
            _ => false,
        };
        if is_key {
            // Value is the car of the next cons cell
            if let Value::Cons(next) = pair.cdr() {
                return Some(next.car());
            }
            return None;
        }
        current = pair.cdr();
    }
    None
}

/// Extract a keyword value from an s-expression plist as a string.
fn get_keyword(value: &Value, key: &str) -> Option<String> {
    get_value(value, key).map(|val| match val {
        Value::Keyword(v) => v.to_string(),
        Value::Symbol(v) => {
            let s = v.to_string();
            s.strip_prefix(':').unwrap_or(&s).to_string()
        }
        Value::String(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "t" } else { "nil" }.to_string(),
        Value::Null => "nil".to_string(),
        other => other.to_string(),
    })
}

/// Extract an integer value from an s-expression plist.
fn get_int(value: &Value, key: &str) -> Option<i64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Extract a string value from an s-expression plist.
fn get_string(value: &Value, key: &str) -> Option<String> {
    get_keyword(value, key)
}

/// Extract a floating-point value from an s-expression plist.
fn get_float(value: &Value, key: &str) -> Option<f64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Collect the top-level elements of a proper list.
fn list_items(value: &Value) -> Vec<&Value> {
    let mut items = Vec::new();
    let mut current = value;
    while let Value::Cons(pair) = current {
        items.push(pair.car());
        current = pair.cdr();
    }
    items
}

/// Parse a list of point plists stored under `:key`.  Each element
/// must carry `:x`, `:y`, and `:t`; coordinates must be finite.
fn parse_points(value: &Value, key: &str) -> Result<Vec<Point>, String> {
    let list = get_value(value, key).ok_or_else(|| format!("missing :{key}"))?;
    let mut points = Vec::new();
    for (index, item) in list_items(list).into_iter().enumerate() {
        let x = get_float(item, "x").ok_or_else(|| format!("point {index} missing :x"))?;
        let y = get_float(item, "y").ok_or_else(|| format!("point {index} missing :y"))?;
        let t = get_int(item, "t").ok_or_else(|| format!("point {index} missing :t"))?;
        if !x.is_finite() || !y.is_finite() {
            return Err(format!("point {index} has non-finite coordinates"));
        }
        points.push(Point::new(x, y, t.max(0) as u64));
    }
    Ok(points)
}

fn blend_config_sexp(config: &BlendConfig) -> String {
    format!(
        "(:geometric-override {:.2} :geometric-floor {:.2} :neural-doubt {:.2} :max-alternatives {})",
        config.geometric_override, config.geometric_floor, config.neural_doubt, config.max_alternatives
    )
}

/// Assemble a broadcast event s-expression from plist fields.
pub fn format_event(event_type: &str, fields: &[(&str, &str)]) -> String {
    use std::fmt::Write;
    let mut s = format!("(:type :event :event :{event_type}");
    for (key, val) in fields {
        let _ = write!(s, " :{key} {val}");
    }
    s.push(')');
    s
}
