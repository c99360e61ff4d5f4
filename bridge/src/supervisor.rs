//! Connection supervisor
//!
//! Owns at most one live MCP session. Concurrent callers of
//! [`Supervisor::ensure_connected`] share a single connect attempt, so the
//! server is spawned once no matter how many tool calls race at startup.
//!
//! A call that fails because the transport closed is retried exactly once on
//! a fresh connection. Everything else goes back to the caller unchanged.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::{Map, Value};

use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::{BridgeError, BridgeResult};
use crate::launch::LaunchTarget;
use crate::sampling::SamplingHandler;
use crate::session::{ProtocolSession, SessionConnector, ToolDescriptor};

/// A session that passed the handshake, with the tools it advertised
pub struct LiveSession {
    pub session: Arc<dyn ProtocolSession>,
    pub tools: Vec<ToolDescriptor>,
}

impl fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSession")
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

impl LiveSession {
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }
}

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

type ConnectAttempt = Shared<BoxFuture<'static, BridgeResult<Arc<LiveSession>>>>;

enum Connection {
    Disconnected,
    Connecting(ConnectAttempt),
    Connected(Arc<LiveSession>),
}

struct State {
    connection: Connection,
    /// Bumped by every disconnect; an attempt from an older generation is stale
    generation: u64,
}

/// Everything a connect attempt needs, detached from `&self`
#[derive(Clone)]
struct Launch {
    target: LaunchTarget,
    required_tools: Vec<String>,
    connector: Arc<dyn SessionConnector>,
    handler: Arc<dyn SamplingHandler>,
    sink: Arc<dyn DiagnosticSink>,
}

pub struct Supervisor {
    launch: Launch,
    state: Arc<Mutex<State>>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Supervisor {
    /// Create a disconnected supervisor. `handler` answers the server's
    /// sampling requests on every session this supervisor opens.
    pub fn new(
        target: LaunchTarget,
        connector: Arc<dyn SessionConnector>,
        handler: Arc<dyn SamplingHandler>,
    ) -> Self {
        Self {
            launch: Launch {
                target,
                required_tools: Vec::new(),
                connector,
                handler,
                sink: Arc::new(TracingSink),
            },
            state: Arc::new(Mutex::new(State {
                connection: Connection::Disconnected,
                generation: 0,
            })),
        }
    }

    /// Tools that must be present for a handshake to succeed
    pub fn with_required_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.launch.required_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.launch.sink = sink;
        self
    }

    pub fn target(&self) -> &LaunchTarget {
        &self.launch.target
    }

    pub fn state(&self) -> ConnectionState {
        match lock(&self.state).connection {
            Connection::Disconnected => ConnectionState::Disconnected,
            Connection::Connecting(_) => ConnectionState::Connecting,
            Connection::Connected(_) => ConnectionState::Connected,
        }
    }

    /// Tools confirmed at the last handshake, empty unless connected
    pub fn tools(&self) -> Vec<ToolDescriptor> {
        match &lock(&self.state).connection {
            Connection::Connected(live) => live.tools.clone(),
            _ => Vec::new(),
        }
    }

    /// Return the live session, connecting first if needed. Callers that
    /// arrive while a connect is in flight await that same attempt.
    pub async fn ensure_connected(&self) -> BridgeResult<Arc<LiveSession>> {
        let attempt = {
            let mut guard = lock(&self.state);
            let state = &mut *guard;
            match &state.connection {
                Connection::Connected(live) => return Ok(live.clone()),
                Connection::Connecting(attempt) => attempt.clone(),
                Connection::Disconnected => {
                    state.generation += 1;
                    let attempt = self.connect_attempt(state.generation).shared();
                    state.connection = Connection::Connecting(attempt.clone());
                    attempt
                }
            }
        };
        attempt.await
    }

    fn connect_attempt(&self, generation: u64) -> BoxFuture<'static, BridgeResult<Arc<LiveSession>>> {
        let launch = self.launch.clone();
        let state = Arc::downgrade(&self.state);

        async move {
            let result = launch.open().await;
            settle(&state, generation, &launch, result).await
        }
        .boxed()
    }

    /// Close the active session, if any. Idempotent.
    pub async fn disconnect(&self) {
        let previous = {
            let mut state = lock(&self.state);
            state.generation += 1;
            std::mem::replace(&mut state.connection, Connection::Disconnected)
        };

        match previous {
            Connection::Connected(live) => {
                live.session.close().await;
                self.launch.sink.line("Disconnected from MCP server");
            }
            Connection::Connecting(_) => {
                // The attempt notices the generation change and closes its own session
                self.launch.sink.line("Abandoned in-flight MCP connection");
            }
            Connection::Disconnected => {}
        }
    }

    /// Shut down for good (until the next `ensure_connected`)
    pub async fn stop(&self) {
        self.disconnect().await;
        tracing::info!("MCP supervisor stopped");
    }

    /// Drop `failed` if it is still the current session
    async fn reset(&self, failed: &Arc<LiveSession>) {
        let stale = {
            let mut guard = lock(&self.state);
            let state = &mut *guard;
            match &state.connection {
                Connection::Connected(live) if Arc::ptr_eq(live, failed) => {
                    state.generation += 1;
                    Some(std::mem::replace(&mut state.connection, Connection::Disconnected))
                }
                _ => None,
            }
        };

        if let Some(Connection::Connected(live)) = stale {
            live.session.close().await;
            self.launch.sink.line("MCP transport closed, reconnecting");
        }
    }

    /// List the server's tools over the live session
    pub async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>> {
        let live = self.ensure_connected().await?;
        live.session.list_tools().await
    }

    /// Call `tool` and decode its result to text.
    ///
    /// A transport-closed failure triggers one disconnect, reconnect and
    /// retry. The retry's outcome is returned as is.
    pub async fn invoke(&self, tool: &str, arguments: Map<String, Value>) -> BridgeResult<String> {
        let mut retried = false;

        loop {
            let live = self.ensure_connected().await?;
            match live.session.call_tool(tool, arguments.clone()).await {
                Ok(output) => {
                    if output.is_error == Some(true) {
                        tracing::warn!(tool = %tool, "Tool reported an error result");
                    }
                    return Ok(output.into_text());
                }
                Err(err) if err.is_transport_closed() && !retried => {
                    tracing::warn!(tool = %tool, error = %err, "Transport closed during call, retrying once");
                    retried = true;
                    self.reset(&live).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Launch {
    /// Spawn, handshake, verify tools. Any session opened here is closed
    /// before an error leaves.
    async fn open(&self) -> BridgeResult<Arc<LiveSession>> {
        for line in self.target.describe() {
            self.sink.line(&line);
        }

        let result = self.open_inner().await;
        match &result {
            Ok(live) => self.sink.line(&format!(
                "Connected to MCP server ({} tools)",
                live.tools.len()
            )),
            Err(e) => self.sink.line(&format!("Failed to connect to MCP server: {}", e)),
        }
        result
    }

    async fn open_inner(&self) -> BridgeResult<Arc<LiveSession>> {
        self.target.verify()?;

        let session = self
            .connector
            .connect(&self.target, self.handler.clone())
            .await?;

        let tools = match session.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                session.close().await;
                return Err(BridgeError::Handshake(format!("failed to list tools: {}", e)));
            }
        };

        let live = LiveSession { session, tools };
        if let Some(missing) = self.required_tools.iter().find(|name| !live.has_tool(name)) {
            live.session.close().await;
            return Err(BridgeError::Handshake(format!(
                "MCP server does not provide required tool '{}'",
                missing
            )));
        }

        Ok(Arc::new(live))
    }
}

/// Record the outcome of attempt `generation`, unless a disconnect made it stale
async fn settle(
    state: &Weak<Mutex<State>>,
    generation: u64,
    launch: &Launch,
    result: BridgeResult<Arc<LiveSession>>,
) -> BridgeResult<Arc<LiveSession>> {
    let current = state.upgrade().is_some_and(|state| {
        let mut state = lock(&state);
        let current = state.generation == generation
            && matches!(state.connection, Connection::Connecting(_));
        if current {
            state.connection = match &result {
                Ok(live) => Connection::Connected(live.clone()),
                Err(_) => Connection::Disconnected,
            };
        }
        current
    });

    if current {
        return result;
    }

    if let Ok(live) = result {
        live.session.close().await;
        launch.sink.line("Closed MCP session opened after disconnect");
    }
    Err(BridgeError::Handshake(
        "connection attempt cancelled by disconnect".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use crate::sampling::{CreateMessageOutcome, SamplingRequest};
    use crate::session::ToolOutput;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct NoSampling;

    #[async_trait]
    impl SamplingHandler for NoSampling {
        async fn create_message(&self, _request: SamplingRequest) -> BridgeResult<CreateMessageOutcome> {
            Err(BridgeError::Provider("no provider in tests".into()))
        }
    }

    type Script = Arc<Mutex<VecDeque<BridgeResult<ToolOutput>>>>;

    struct FakeSession {
        tools: Vec<&'static str>,
        script: Script,
        closed: AtomicBool,
    }

    #[async_trait]
    impl ProtocolSession for FakeSession {
        async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>> {
            Ok(self.tools.iter().map(|t| ToolDescriptor::new(*t)).collect())
        }

        async fn call_tool(&self, _name: &str, _arguments: Map<String, Value>) -> BridgeResult<ToolOutput> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ToolOutput::text("default")))
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct FakeConnector {
        spawns: AtomicUsize,
        delay: Duration,
        tools: Vec<&'static str>,
        script: Script,
        sessions: Mutex<Vec<Arc<FakeSession>>>,
    }

    impl FakeConnector {
        fn new(tools: Vec<&'static str>) -> Self {
            Self {
                spawns: AtomicUsize::new(0),
                delay: Duration::from_millis(0),
                tools,
                script: Arc::new(Mutex::new(VecDeque::new())),
                sessions: Mutex::new(Vec::new()),
            }
        }

        fn script(&self, results: Vec<BridgeResult<ToolOutput>>) {
            self.script.lock().unwrap().extend(results);
        }

        fn spawns(&self) -> usize {
            self.spawns.load(Ordering::SeqCst)
        }

        fn closed(&self) -> Vec<bool> {
            self.sessions
                .lock()
                .unwrap()
                .iter()
                .map(|s| s.closed.load(Ordering::SeqCst))
                .collect()
        }
    }

    #[async_trait]
    impl SessionConnector for FakeConnector {
        async fn connect(
            &self,
            _target: &LaunchTarget,
            _handler: Arc<dyn SamplingHandler>,
        ) -> BridgeResult<Arc<dyn ProtocolSession>> {
            self.spawns.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let session = Arc::new(FakeSession {
                tools: self.tools.clone(),
                script: self.script.clone(),
                closed: AtomicBool::new(false),
            });
            self.sessions.lock().unwrap().push(session.clone());
            Ok(session)
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        connector: Arc<FakeConnector>,
        sink: MemorySink,
        supervisor: Arc<Supervisor>,
    }

    fn fixture(connector: FakeConnector, required: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.py");
        std::fs::write(&path, "").unwrap();

        let connector = Arc::new(connector);
        let sink = MemorySink::new();
        let supervisor = Supervisor::new(
            LaunchTarget::new(path, Some("python3".into())),
            connector.clone(),
            Arc::new(NoSampling),
        )
        .with_required_tools(required.iter().copied())
        .with_sink(Arc::new(sink.clone()));

        Fixture {
            _dir: dir,
            connector,
            sink,
            supervisor: Arc::new(supervisor),
        }
    }

    fn closed_error() -> BridgeError {
        BridgeError::invocation("Connection closed", None)
    }

    #[tokio::test]
    async fn test_concurrent_connects_spawn_once() {
        let mut connector = FakeConnector::new(vec!["greet"]);
        connector.delay = Duration::from_millis(20);
        let fx = fixture(connector, &["greet"]);

        let calls = (0..8).map(|_| fx.supervisor.ensure_connected());
        let results = futures_util::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(fx.connector.spawns(), 1);
        assert_eq!(fx.supervisor.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_connected_returns_same_session() {
        let fx = fixture(FakeConnector::new(vec!["greet"]), &["greet"]);

        let first = fx.supervisor.ensure_connected().await.unwrap();
        let second = fx.supervisor.ensure_connected().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fx.connector.spawns(), 1);
    }

    #[tokio::test]
    async fn test_missing_required_tool_fails_and_closes() {
        let fx = fixture(FakeConnector::new(vec!["greet"]), &["greet", "query_html"]);

        let err = fx.supervisor.ensure_connected().await.unwrap_err();

        assert!(matches!(err, BridgeError::Handshake(_)));
        assert!(err.to_string().contains("query_html"));
        assert_eq!(fx.connector.closed(), vec![true]);
        assert_eq!(fx.supervisor.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_missing_server_file_never_spawns() {
        let fx = fixture(FakeConnector::new(vec![]), &[]);
        let supervisor = Supervisor::new(
            LaunchTarget::new("/no/such/server.py", None),
            fx.connector.clone(),
            Arc::new(NoSampling),
        );

        let err = supervisor.ensure_connected().await.unwrap_err();
        assert!(matches!(err, BridgeError::TransportSpawn { .. }));
        assert_eq!(fx.connector.spawns(), 0);
    }

    #[tokio::test]
    async fn test_failed_connect_can_be_retried() {
        let fx = fixture(FakeConnector::new(vec![]), &["greet"]);

        assert!(fx.supervisor.ensure_connected().await.is_err());
        assert!(fx.supervisor.ensure_connected().await.is_err());
        assert_eq!(fx.connector.spawns(), 2);
    }

    #[tokio::test]
    async fn test_invoke_decodes_text() {
        let fx = fixture(FakeConnector::new(vec!["greet"]), &["greet"]);
        fx.connector.script(vec![Ok(ToolOutput::text("Hello, World!"))]);

        let text = fx.supervisor.invoke("greet", Map::new()).await.unwrap();
        assert_eq!(text, "Hello, World!");
    }

    #[tokio::test]
    async fn test_closed_then_success_retries_transparently() {
        let fx = fixture(FakeConnector::new(vec!["greet"]), &["greet"]);
        fx.connector
            .script(vec![Err(closed_error()), Ok(ToolOutput::text("after reconnect"))]);

        let text = fx.supervisor.invoke("greet", Map::new()).await.unwrap();

        assert_eq!(text, "after reconnect");
        assert_eq!(fx.connector.spawns(), 2);
        assert_eq!(fx.connector.closed(), vec![true, false]);
        assert!(fx
            .sink
            .lines()
            .contains(&"MCP transport closed, reconnecting".to_string()));
    }

    #[tokio::test]
    async fn test_two_closed_errors_propagate_second() {
        let fx = fixture(FakeConnector::new(vec!["greet"]), &["greet"]);
        fx.connector.script(vec![
            Err(BridgeError::invocation("first closed", None)),
            Err(BridgeError::invocation("second closed", Some(-32000))),
        ]);

        let err = fx.supervisor.invoke("greet", Map::new()).await.unwrap_err();

        assert_eq!(err.to_string(), "second closed");
        assert_eq!(fx.connector.spawns(), 2);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let fx = fixture(FakeConnector::new(vec!["greet"]), &["greet"]);
        fx.connector
            .script(vec![Err(BridgeError::invocation("invalid params", Some(-32602)))]);

        let err = fx.supervisor.invoke("greet", Map::new()).await.unwrap_err();

        assert_eq!(err.to_string(), "invalid params");
        assert_eq!(fx.connector.spawns(), 1);
        assert_eq!(fx.supervisor.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let fx = fixture(FakeConnector::new(vec!["greet"]), &["greet"]);
        fx.supervisor.ensure_connected().await.unwrap();

        fx.supervisor.disconnect().await;
        fx.supervisor.disconnect().await;

        assert_eq!(fx.supervisor.state(), ConnectionState::Disconnected);
        assert_eq!(fx.connector.closed(), vec![true]);
        assert!(fx.supervisor.tools().is_empty());
    }

    #[tokio::test]
    async fn test_stop_during_connect_closes_new_session() {
        let mut connector = FakeConnector::new(vec!["greet"]);
        connector.delay = Duration::from_millis(50);
        let fx = fixture(connector, &["greet"]);

        let supervisor = fx.supervisor.clone();
        let pending = tokio::spawn(async move { supervisor.ensure_connected().await.map(|_| ()) });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fx.supervisor.state(), ConnectionState::Connecting);

        fx.supervisor.stop().await;
        let result = pending.await.unwrap();

        assert!(result.is_err());
        assert_eq!(fx.connector.closed(), vec![true]);
        assert_eq!(fx.supervisor.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_transitions_reach_sink() {
        let fx = fixture(FakeConnector::new(vec!["greet"]), &["greet"]);
        fx.supervisor.ensure_connected().await.unwrap();
        fx.supervisor.stop().await;

        let lines = fx.sink.lines();
        assert_eq!(lines[0], "Starting MCP server:");
        assert!(lines.contains(&"Connected to MCP server (1 tools)".to_string()));
        assert_eq!(lines.last().unwrap(), "Disconnected from MCP server");
    }
}
