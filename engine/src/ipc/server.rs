//! Unix-socket IPC transport.
//!
//! Frames on the wire are a 4-byte big-endian payload length followed
//! by a UTF-8 s-expression.  The listener is a calloop source; client
//! sockets are nonblocking and pumped once per loop iteration by the
//! runtime, so the whole transport stays on the single engine thread.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Instant;

use calloop::generic::Generic;
use calloop::{Interest, LoopHandle, Mode, PostAction};
use tracing::{debug, info, warn};

use super::dispatch;
use crate::state::EngineState;

/// Frame payloads above this are a protocol violation (1 MiB).
const MAX_FRAME_BYTES: u32 = 1 << 20;

/// Outgoing buffer cap; events are dropped past this, responses are not.
const WRITE_BUFFER_CAP: usize = 64 * 1024;

/// Incoming messages allowed per client per second unless raised over IPC.
const DEFAULT_MESSAGES_PER_SEC: u32 = 200;

// ── Rate limiting ──────────────────────────────────────────

/// One-second message budget, reset when the window rolls over.
pub struct MessageBudget {
    pub max_per_second: u32,
    window_started: Instant,
    used: u32,
}

impl MessageBudget {
    fn new(max_per_second: u32) -> Self {
        Self {
            max_per_second,
            window_started: Instant::now(),
            used: 0,
        }
    }

    /// Account for one incoming message.  False when over budget.
    fn admit(&mut self) -> bool {
        if self.window_started.elapsed().as_secs() >= 1 {
            self.window_started = Instant::now();
            self.used = 1;
            return true;
        }
        self.used += 1;
        self.used <= self.max_per_second
    }
}

// ── Peer identity ──────────────────────────────────────────

/// Peer credentials via SO_PEERCRED.  Unavailable off Linux.
fn peer_cred(stream: &UnixStream) -> (Option<u32>, Option<i32>) {
    #[cfg(target_os = "linux")]
    {
        let mut cred: libc::ucred = unsafe { std::mem::zeroed() };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;
        let ret = unsafe {
            libc::getsockopt(
                stream.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                &mut cred as *mut _ as *mut libc::c_void,
                &mut len,
            )
        };
        if ret == 0 {
            (Some(cred.uid), Some(cred.pid))
        } else {
            (None, None)
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = stream;
        (None, None)
    }
}

// ── Client connection ──────────────────────────────────────

/// One connected control client.
pub struct IpcClient {
    pub id: u64,
    stream: UnixStream,
    inbox: Vec<u8>,
    outbox: Vec<u8>,
    /// Set once the hello handshake passes the UID check.
    pub authenticated: bool,
    pub peer_uid: Option<u32>,
    pub peer_pid: Option<i32>,
    pub budget: MessageBudget,
}

impl IpcClient {
    fn attach(stream: UnixStream, id: u64) -> Self {
        stream.set_nonblocking(true).ok();
        let (peer_uid, peer_pid) = peer_cred(&stream);
        match peer_uid {
            Some(uid) => debug!(id, peer_uid = uid, peer_pid = ?peer_pid, "peer credentials"),
            None => warn!(id, "peer credentials unavailable"),
        }
        Self {
            id,
            stream,
            inbox: Vec::with_capacity(4096),
            outbox: Vec::new(),
            authenticated: false,
            peer_uid,
            peer_pid,
            budget: MessageBudget::new(DEFAULT_MESSAGES_PER_SEC),
        }
    }

    /// Drain whatever the socket has into the inbox.  An EOF or hard
    /// error means the connection is gone.
    fn pump_read(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; 4096];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(io::ErrorKind::ConnectionReset.into()),
                Ok(n) => self.inbox.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Pop the next complete frame off the inbox, if one has arrived.
    /// An oversized length prefix is a protocol violation and drops the
    /// connection.
    fn next_frame(&mut self) -> io::Result<Option<String>> {
        let Some(prefix) = self.inbox.first_chunk::<4>() else {
            return Ok(None);
        };
        let len = u32::from_be_bytes(*prefix);
        if len > MAX_FRAME_BYTES {
            warn!(client_id = self.id, len, "frame exceeds maximum size");
            return Err(io::ErrorKind::InvalidData.into());
        }
        let total = 4 + len as usize;
        if self.inbox.len() < total {
            return Ok(None);
        }
        let payload = String::from_utf8_lossy(&self.inbox[4..total]).into_owned();
        self.inbox.drain(..total);
        Ok(Some(payload))
    }

    /// Frame and queue a response.  Responses are never dropped.
    pub fn enqueue_message(&mut self, payload: &str) {
        self.outbox
            .extend_from_slice(&(payload.len() as u32).to_be_bytes());
        self.outbox.extend_from_slice(payload.as_bytes());
    }

    /// Frame and queue a broadcast event, unless the client is so far
    /// behind that the outbox is over its cap.
    fn enqueue_event(&mut self, payload: &str) {
        if self.outbox.len() > WRITE_BUFFER_CAP {
            warn!(client_id = self.id, "outbox overflow, dropping event");
            return;
        }
        self.enqueue_message(payload);
    }

    /// Write as much of the outbox as the socket will take.
    fn flush(&mut self) -> io::Result<()> {
        while !self.outbox.is_empty() {
            match self.stream.write(&self.outbox) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.outbox.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

// ── Server ─────────────────────────────────────────────────

pub struct IpcServer {
    pub socket_path: PathBuf,
    pub clients: HashMap<u64, IpcClient>,
    next_client_id: u64,
    pub ipc_trace: bool,
}

impl IpcServer {
    /// Create the server.  Does not bind; call [`IpcServer::bind`] once
    /// the event loop exists.
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            clients: HashMap::new(),
            next_client_id: 1,
            ipc_trace: false,
        }
    }

    pub fn default_socket_path() -> PathBuf {
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .unwrap_or_else(|_| format!("/tmp/airglyph-{}", unsafe { libc::getuid() }));
        PathBuf::from(runtime_dir).join("airglyph-ipc.sock")
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Bind the listener, lock it down to the owning user, and register
    /// the accept handler with calloop.
    pub fn bind(
        socket_path: &Path,
        loop_handle: &LoopHandle<'static, EngineState>,
    ) -> anyhow::Result<()> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }
        let listener = UnixListener::bind(socket_path)?;
        listener.set_nonblocking(true)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o700))?;
        }

        info!(?socket_path, "IPC server listening");

        let source = Generic::new(listener, Interest::READ, Mode::Level);
        loop_handle
            .insert_source(source, |_event, listener, state| {
                loop {
                    match listener.accept() {
                        Ok((stream, _addr)) => {
                            let id = state.ipc_server.next_client_id;
                            state.ipc_server.next_client_id += 1;
                            info!(client_id = id, "IPC client connected");
                            state.ipc_server.clients.insert(id, IpcClient::attach(stream, id));
                        }
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                        Err(e) => {
                            warn!("accept error: {e}");
                            break;
                        }
                    }
                }
                Ok(PostAction::Continue)
            })
            .map_err(|e| anyhow::anyhow!("failed to register IPC listener: {e}"))?;

        Ok(())
    }

    /// Pump every client once: read, dispatch complete frames, flush.
    /// Called each event loop iteration by the runtime.
    pub fn poll_clients(state: &mut EngineState) {
        let ids: Vec<u64> = state.ipc_server.clients.keys().copied().collect();
        for id in ids {
            if !Self::service_client(state, id) {
                info!(client_id = id, "removing disconnected IPC client");
                state.ipc_server.clients.remove(&id);
            }
        }
    }

    /// One read/dispatch/flush round for a single client.  False when
    /// the connection should be torn down.
    fn service_client(state: &mut EngineState, id: u64) -> bool {
        let frames = {
            let Some(client) = state.ipc_server.clients.get_mut(&id) else {
                return false;
            };
            if let Err(e) = client.pump_read() {
                debug!(client_id = id, "read failed: {e}");
                return false;
            }
            let mut frames = Vec::new();
            loop {
                match client.next_frame() {
                    Ok(Some(frame)) => frames.push(frame),
                    Ok(None) => break,
                    Err(_) => return false,
                }
            }
            frames
        };

        for raw in frames {
            let admitted = state
                .ipc_server
                .clients
                .get_mut(&id)
                .is_some_and(|c| c.budget.admit());
            if !admitted {
                warn!(client_id = id, "rate limit exceeded, dropping message");
                if let Some(client) = state.ipc_server.clients.get_mut(&id) {
                    client.enqueue_message(
                        "(:type :response :id 0 :status :error :reason \"rate limit exceeded\")",
                    );
                }
                continue;
            }

            if state.ipc_server.ipc_trace {
                info!(client_id = id, "<< {raw}");
            }
            if let Some(reply) = dispatch::handle_message(state, id, &raw) {
                if state.ipc_server.ipc_trace {
                    info!(client_id = id, ">> {reply}");
                }
                if let Some(client) = state.ipc_server.clients.get_mut(&id) {
                    client.enqueue_message(&reply);
                }
            }
        }

        match state.ipc_server.clients.get_mut(&id) {
            Some(client) => match client.flush() {
                Ok(()) => true,
                Err(e) => {
                    debug!(client_id = id, "write failed: {e}");
                    false
                }
            },
            None => false,
        }
    }

    /// Queue an event for every client that completed the handshake.
    pub fn broadcast_event(state: &mut EngineState, event: &str) {
        if state.ipc_server.ipc_trace {
            info!("broadcast >> {event}");
        }
        for client in state.ipc_server.clients.values_mut() {
            if client.authenticated {
                client.enqueue_event(event);
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_admits_until_exhausted() {
        let mut budget = MessageBudget::new(3);
        assert!(budget.admit());
        assert!(budget.admit());
        assert!(budget.admit());
        assert!(!budget.admit(), "fourth message in the window must be refused");
    }

    #[test]
    fn test_budget_default_limit() {
        let budget = MessageBudget::new(DEFAULT_MESSAGES_PER_SEC);
        assert_eq!(budget.max_per_second, 200);
    }

    fn loopback_pair() -> (IpcClient, UnixStream) {
        let (a, b) = UnixStream::pair().expect("socketpair");
        (IpcClient::attach(a, 1), b)
    }

    fn frame(payload: &str) -> Vec<u8> {
        let mut bytes = (payload.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(payload.as_bytes());
        bytes
    }

    #[test]
    fn test_frame_extraction() {
        let (mut client, mut peer) = loopback_pair();
        peer.write_all(&frame("(:type :ping :id 1)")).unwrap();
        peer.write_all(&frame("(:type :ping :id 2)")).unwrap();

        client.pump_read().unwrap();
        assert_eq!(
            client.next_frame().unwrap().as_deref(),
            Some("(:type :ping :id 1)")
        );
        assert_eq!(
            client.next_frame().unwrap().as_deref(),
            Some("(:type :ping :id 2)")
        );
        assert_eq!(client.next_frame().unwrap(), None);
    }

    #[test]
    fn test_partial_frame_waits_for_more_data() {
        let (mut client, mut peer) = loopback_pair();
        let full = frame("(:type :ping :id 7)");
        peer.write_all(&full[..6]).unwrap();
        client.pump_read().unwrap();
        assert_eq!(client.next_frame().unwrap(), None);

        peer.write_all(&full[6..]).unwrap();
        client.pump_read().unwrap();
        assert_eq!(
            client.next_frame().unwrap().as_deref(),
            Some("(:type :ping :id 7)")
        );
    }

    #[test]
    fn test_oversized_frame_is_protocol_violation() {
        let (mut client, mut peer) = loopback_pair();
        peer.write_all(&(MAX_FRAME_BYTES + 1).to_be_bytes()).unwrap();
        client.pump_read().unwrap();
        assert!(client.next_frame().is_err());
    }

    #[test]
    fn test_enqueue_frames_with_length_prefix() {
        let (mut client, mut peer) = loopback_pair();
        let payload = "(:type :response :id 1 :status :ok)";
        client.enqueue_message(payload);
        client.flush().unwrap();

        let mut received = vec![0u8; 4 + payload.len()];
        peer.read_exact(&mut received).unwrap();
        assert_eq!(received[..4], (payload.len() as u32).to_be_bytes()[..]);
        assert_eq!(&received[4..], payload.as_bytes());
    }

    #[test]
    fn test_event_dropped_when_outbox_full() {
        let (mut client, _peer) = loopback_pair();
        client.outbox = vec![0u8; WRITE_BUFFER_CAP + 1];
        let before = client.outbox.len();
        client.enqueue_event("(:type :event :event :result-changed)");
        assert_eq!(client.outbox.len(), before, "event must be dropped");

        // Responses still go through.
        client.enqueue_message("(:type :response :id 1 :status :ok)");
        assert!(client.outbox.len() > before);
    }

    #[test]
    fn test_default_socket_path_has_engine_name() {
        let path = IpcServer::default_socket_path();
        assert!(path.to_string_lossy().contains("airglyph-ipc.sock"));
    }
}
