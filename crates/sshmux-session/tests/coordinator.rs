// End-to-end coordinator scenarios driven against a scripted transport:
// gating, FIFO ordering, cancellation, timeout, recovery reset, and replay.

use async_trait::async_trait;
use sshmux_core::{ExecOutcome, Source};
use sshmux_session::{
    CommandTransport, EventSink, ExecEvent, ExecStream, Session, SessionError, SessionEvent,
    SessionTunables, TranscriptEntry,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Reply {
    stdout: &'static str,
    stderr: &'static str,
    exit: i32,
    /// Never complete; the stream stays open until cancelled.
    hang: bool,
}

impl Reply {
    fn ok(stdout: &'static str) -> Self {
        Self { stdout, stderr: "", exit: 0, hang: false }
    }

    fn hang() -> Self {
        Self { stdout: "", stderr: "", exit: 0, hang: true }
    }
}

struct MockTransport {
    script: Mutex<HashMap<&'static str, Reply>>,
    log: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MockTransport {
    fn new(script: impl IntoIterator<Item = (&'static str, Reply)>) -> Arc<Self> {
        let mut map: HashMap<&'static str, Reply> = script.into_iter().collect();
        map.entry("pwd").or_insert_with(|| Reply::ok("/home/alice"));
        Arc::new(Self {
            script: Mutex::new(map),
            log: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    fn executed(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandTransport for MockTransport {
    async fn exec(&self, command: &str) -> std::io::Result<ExecStream> {
        self.log.lock().unwrap().push(command.to_string());
        let reply = self
            .script
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or(Reply { stdout: "", stderr: "", exit: 0, hang: false });

        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let stream_cancel = cancel.clone();
        tokio::spawn(async move {
            if reply.hang {
                stream_cancel.cancelled().await;
                return;
            }
            if !reply.stdout.is_empty() {
                let _ = tx.send(ExecEvent::Stdout(reply.stdout.as_bytes().to_vec())).await;
            }
            if !reply.stderr.is_empty() {
                let _ = tx.send(ExecEvent::Stderr(reply.stderr.as_bytes().to_vec())).await;
            }
            let _ = tx.send(ExecEvent::Exit(reply.exit)).await;
        });
        Ok(ExecStream { events: rx, cancel })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Viewer sink
// ---------------------------------------------------------------------------

struct ChannelSink(mpsc::UnboundedSender<SessionEvent>);

impl EventSink for ChannelSink {
    fn deliver(&self, event: &SessionEvent) -> bool {
        self.0.send(event.clone()).is_ok()
    }

    fn is_alive(&self) -> bool {
        !self.0.is_closed()
    }
}

fn attach_viewer(
    session: &Session,
) -> (Vec<TranscriptEntry>, mpsc::UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let replay = session.attach(Box::new(ChannelSink(tx)));
    (replay, rx)
}

fn spawn_session(transport: Arc<MockTransport>) -> Arc<Session> {
    Session::spawn("s1", "host", "alice", transport, SessionTunables::default())
}

async fn run_human(session: &Session, command: &str) -> ExecOutcome {
    session
        .submit(command, Source::Human, None, None)
        .unwrap()
        .await
        .unwrap()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Gating on interleaved human then assistant activity
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn gating_fires_after_human_command() {
    let transport = MockTransport::new([("pwd", Reply::ok("/home/alice"))]);
    let session = spawn_session(transport.clone());

    let outcome = run_human(&session, "pwd").await;
    assert_eq!(outcome.stdout, "/home/alice");
    assert_eq!(outcome.exit_code, 0);

    let err = session
        .submit("whoami", Source::Assistant, None, None)
        .unwrap_err();
    match err {
        SessionError::Gated(entries) => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].command, "pwd");
            assert_eq!(entries[0].source, Source::Human);
            assert_eq!(entries[0].result.stdout, "/home/alice");
            assert_eq!(entries[0].result.exit_code, 0);
        }
        other => panic!("expected gate, got {other:?}"),
    }

    // The gate clears the ledger and no whoami ever reaches the transport.
    assert!(session.ledger_snapshot().is_empty());
    assert!(!transport.executed().iter().any(|c| c == "whoami"));
}

#[tokio::test(start_paused = true)]
async fn assistant_is_not_gated_by_own_entries() {
    let transport = MockTransport::new([("whoami", Reply::ok("alice"))]);
    let session = spawn_session(transport);

    for _ in 0..2 {
        let outcome = session
            .submit("whoami", Source::Assistant, None, None)
            .unwrap()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.stdout, "alice");
    }
}

// ---------------------------------------------------------------------------
// Ordering under contention
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn fifo_ordering_and_transcript_shape() {
    let transport = MockTransport::new([
        ("echo 1", Reply::ok("1\n")),
        ("echo 2", Reply::ok("2\n")),
    ]);
    let session = spawn_session(transport);

    let rx1 = session.submit("echo 1", Source::Human, None, None).unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    let rx2 = session.submit("echo 2", Source::Human, None, None).unwrap();

    rx1.await.unwrap().unwrap();
    rx2.await.unwrap().unwrap();

    let (replay, _rx) = attach_viewer(&session);
    let joined: String = replay.iter().map(|e| e.data.as_str()).collect();
    assert_eq!(
        joined,
        "[alice@host ~]$ echo 1\r\n1\r\n[alice@host ~]$ echo 2\r\n2\r\n"
    );
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn sigint_interrupts_active_command() {
    let transport = MockTransport::new([("sleep 30", Reply::hang())]);
    let session = spawn_session(transport);
    let (_replay, mut events) = attach_viewer(&session);

    let rx = session.submit("sleep 30", Source::Human, None, None).unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    session.interrupt();

    let result = rx.await.unwrap();
    assert!(matches!(result, Err(SessionError::Cancelled)));

    let ledger = session.ledger_snapshot();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].result.stdout, "");
    assert_eq!(ledger[0].result.stderr, "^C");
    assert_eq!(ledger[0].result.exit_code, 130);

    // A ready event follows so the viewer can type again.
    let mut saw_ready = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::Ready) {
            saw_ready = true;
        }
    }
    assert!(saw_ready);
}

#[tokio::test(start_paused = true)]
async fn sigint_rejects_queued_commands_too() {
    let transport = MockTransport::new([("sleep 30", Reply::hang())]);
    let session = spawn_session(transport.clone());

    let rx1 = session.submit("sleep 30", Source::Human, None, None).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let rx2 = session.submit("echo queued", Source::Human, None, None).unwrap();

    session.interrupt();

    assert!(matches!(rx1.await.unwrap(), Err(SessionError::Cancelled)));
    assert!(matches!(rx2.await.unwrap(), Err(SessionError::Cancelled)));
    assert!(!transport.executed().iter().any(|c| c == "echo queued"));
}

#[tokio::test(start_paused = true)]
async fn assistant_cancel_is_scoped_and_keeps_human_ledger() {
    let transport = MockTransport::new([("sleep 30", Reply::hang()), ("pwd", Reply::ok("/home/alice"))]);
    let session = spawn_session(transport);

    run_human(&session, "pwd").await;

    // No active assistant command yet.
    assert!(matches!(
        session.cancel_assistant(),
        Err(SessionError::NoActiveAssistantCommand)
    ));

    // Clear the gate the legitimate way, then start a long assistant command.
    session.recovery_reset("test setup");
    let rx = session
        .submit("sleep 30", Source::Assistant, None, None)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    cancel_active_assistant(&session, rx).await;
}

async fn cancel_active_assistant(
    session: &Session,
    rx: tokio::sync::oneshot::Receiver<Result<ExecOutcome, SessionError>>,
) {
    session.cancel_assistant().unwrap();
    assert!(matches!(rx.await.unwrap(), Err(SessionError::Cancelled)));
    // Assistant entries are surgically removed from the ledger.
    assert!(session
        .ledger_snapshot()
        .iter()
        .all(|e| e.source != Source::Assistant));
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn timeout_fails_command_and_session_stays_usable() {
    let transport = MockTransport::new([
        ("sleep 30", Reply::hang()),
        ("whoami", Reply::ok("alice")),
    ]);
    let session = spawn_session(transport);

    let rx = session
        .submit(
            "sleep 30",
            Source::Assistant,
            Some(Duration::from_millis(500)),
            None,
        )
        .unwrap();

    match rx.await.unwrap() {
        Err(SessionError::Timeout { ms }) => assert_eq!(ms, 500),
        other => panic!("expected timeout, got {other:?}"),
    }

    // The timed-out entry carries the 124 marker.
    let ledger = session.ledger_snapshot();
    assert_eq!(ledger.last().unwrap().result.exit_code, 124);

    // Subsequent execs are admitted normally.
    let outcome = session
        .submit("whoami", Source::Assistant, None, None)
        .unwrap()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.stdout, "alice");
}

#[tokio::test(start_paused = true)]
async fn stdout_activity_resets_the_idle_deadline() {
    // A command that streams a chunk, pauses less than the timeout, then
    // exits: total residency exceeds the timeout but it must still succeed.
    struct Trickle;

    #[async_trait]
    impl CommandTransport for Trickle {
        async fn exec(&self, _command: &str) -> std::io::Result<ExecStream> {
            let (tx, rx) = mpsc::channel(4);
            let cancel = CancellationToken::new();
            tokio::spawn(async move {
                for _ in 0..4u8 {
                    tokio::time::sleep(Duration::from_millis(400)).await;
                    if tx.send(ExecEvent::Stdout(b"tick\n".to_vec())).await.is_err() {
                        return;
                    }
                }
                let _ = tx.send(ExecEvent::Exit(0)).await;
            });
            Ok(ExecStream { events: rx, cancel })
        }

        async fn close(&self) {}
    }

    let session = Session::spawn(
        "s1",
        "host",
        "alice",
        Arc::new(Trickle),
        SessionTunables::default(),
    );

    let outcome = session
        .submit(
            "stream",
            Source::Human,
            Some(Duration::from_millis(500)),
            None,
        )
        .unwrap()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.stdout, "tick\ntick\ntick\ntick\n");
}

// ---------------------------------------------------------------------------
// Recovery reset
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn recovery_reset_clears_the_gate() {
    let transport = MockTransport::new([
        ("pwd", Reply::ok("/home/alice")),
        ("whoami", Reply::ok("alice")),
    ]);
    let session = spawn_session(transport);

    run_human(&session, "pwd").await;
    assert_eq!(session.ledger_snapshot().len(), 1);

    session.recovery_reset("operator request");

    let outcome = session
        .submit("whoami", Source::Assistant, None, None)
        .unwrap()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.stdout, "alice");
    assert_eq!(outcome.exit_code, 0);
}

#[tokio::test(start_paused = true)]
async fn recovery_reset_is_idempotent() {
    let transport = MockTransport::new([("pwd", Reply::ok("/home/alice"))]);
    let session = spawn_session(transport);

    run_human(&session, "pwd").await;
    session.recovery_reset("first");
    session.recovery_reset("second");

    assert_eq!(session.last_reset().as_deref(), Some("second"));
    assert!(session.ledger_snapshot().is_empty());
    assert!(session
        .submit("anything", Source::Assistant, None, None)
        .is_ok());
}

#[tokio::test(start_paused = true)]
async fn configured_recovery_timeout_resets_a_stuck_session() {
    let transport = MockTransport::new([("sleep 30", Reply::hang()), ("pwd", Reply::ok("/home/alice"))]);
    let tunables = SessionTunables {
        // Idle timeout far above the recovery bound so the recovery deadline
        // is what fires.
        command_timeout: Duration::from_secs(3600),
        recovery_timeout: Some(Duration::from_secs(2)),
        ..SessionTunables::default()
    };
    let session = Session::spawn("s1", "host", "alice", transport, tunables);

    run_human(&session, "pwd").await;
    let rx = session.submit("sleep 30", Source::Human, None, None).unwrap();

    assert!(matches!(rx.await.unwrap(), Err(SessionError::Cancelled)));
    // The reset emptied the gate: an assistant command is admitted.
    assert!(session.ledger_snapshot().is_empty());
    assert!(session
        .submit("whoami", Source::Assistant, None, None)
        .is_ok());
}

// ---------------------------------------------------------------------------
// Replay on reattach
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn replay_is_a_prefix_of_the_live_stream()  {
    let transport = MockTransport::new([
        ("echo 1", Reply::ok("1\n")),
        ("echo 2", Reply::ok("2\n")),
        ("echo 3", Reply::ok("3\n")),
    ]);
    let session = spawn_session(transport);

    run_human(&session, "echo 1").await;
    run_human(&session, "echo 2").await;

    let (replay, mut live) = attach_viewer(&session);
    let replayed: String = replay.iter().map(|e| e.data.as_str()).collect();
    assert_eq!(
        replayed,
        "[alice@host ~]$ echo 1\r\n1\r\n[alice@host ~]$ echo 2\r\n2\r\n"
    );

    run_human(&session, "echo 3").await;

    let mut live_output = String::new();
    while let Ok(event) = live.try_recv() {
        if let SessionEvent::Output(entry) = event {
            live_output.push_str(&entry.data);
        }
    }
    assert_eq!(live_output, "[alice@host ~]$ echo 3\r\n3\r\n");
}

// ---------------------------------------------------------------------------
// Cross-cutting invariants
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn system_commands_never_touch_the_ledger() {
    let transport = MockTransport::new([("uptime", Reply::ok("up 1 day\n"))]);
    let session = spawn_session(transport);

    session
        .submit("uptime", Source::System, None, None)
        .unwrap()
        .await
        .unwrap()
        .unwrap();

    assert!(session.ledger_snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn exit_commands_are_refused() {
    let transport = MockTransport::new([]);
    let session = spawn_session(transport.clone());

    for cmd in ["exit", "exit 0", "  exit  "] {
        assert!(matches!(
            session.submit(cmd, Source::Human, None, None),
            Err(SessionError::ShellTerminating)
        ));
    }
    // But commands merely containing "exit" run fine.
    assert!(session.submit("echo exit", Source::Human, None, None).is_ok());
    assert!(transport.executed().iter().all(|c| c != "exit"));
}

#[tokio::test(start_paused = true)]
async fn directory_change_invalidates_prompt_cache() {
    let transport = MockTransport::new([
        ("pwd", Reply::ok("/home/alice")),
        ("cd /var/log", Reply::ok("")),
        ("ls", Reply::ok("syslog\n")),
    ]);
    let session = spawn_session(transport.clone());

    run_human(&session, "pwd").await;

    // The cache is refreshed right after the cd completes, so the remote's
    // answer must change before the cd runs.
    transport
        .script
        .lock()
        .unwrap()
        .insert("pwd", Reply::ok("/var/log"));
    run_human(&session, "cd /var/log").await;
    run_human(&session, "ls").await;

    let (replay, _) = attach_viewer(&session);
    assert!(replay[0].data.starts_with("[alice@host ~]$ pwd"));
    let last = replay.last().unwrap();
    assert!(last.data.starts_with("[alice@host /var/log]$ ls"));
}

#[tokio::test(start_paused = true)]
async fn terminal_output_uses_crlf_only() {
    let transport = MockTransport::new([("printf", Reply::ok("a\nb\nc\n"))]);
    let session = spawn_session(transport);

    run_human(&session, "printf").await;

    let (replay, _) = attach_viewer(&session);
    for entry in replay {
        let mut prev = '\0';
        for c in entry.data.chars() {
            if c == '\n' {
                assert_eq!(prev, '\r', "lone LF in transcript data: {:?}", entry.data);
            }
            prev = c;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn teardown_rejects_pending_and_closes_transport() {
    let transport = MockTransport::new([("sleep 30", Reply::hang())]);
    let session = spawn_session(transport.clone());

    let rx = session.submit("sleep 30", Source::Human, None, None).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    session.teardown("session disconnected").await;

    assert!(matches!(rx.await.unwrap(), Err(SessionError::Cancelled)));
    assert!(transport.closed.load(Ordering::SeqCst));
}
