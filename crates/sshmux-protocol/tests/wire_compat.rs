// Verify wire format matches what existing browser terminals and assistant
// clients expect. These tests ensure protocol compatibility is never broken.

use sshmux_protocol::envelope;
use sshmux_protocol::frames::{InboundFrame, OutboundFrame, ProcessingState};

use sshmux_core::{BrowserCommandEntry, CommandId, ExecOutcome, Source};

#[test]
fn terminal_output_frame_shape() {
    let frame = OutboundFrame::TerminalOutput {
        session_name: "s1".into(),
        timestamp: chrono::Utc::now(),
        data: "[alice@host ~]$ ls\r\n".into(),
        source: Source::Human,
    };
    let json = frame.to_json();

    assert!(json.contains(r#""type":"terminal_output""#));
    assert!(json.contains(r#""sessionName":"s1""#));
    assert!(json.contains(r#""source":"human""#));
    assert!(json.contains(r#""data":"[alice@host ~]$ ls\r\n""#));
    assert!(json.contains(r#""timestamp""#));
}

#[test]
fn processing_state_frame_shape() {
    let frame = OutboundFrame::ProcessingState {
        session_name: "s1".into(),
        state: ProcessingState::Executing,
    };
    let json = frame.to_json();
    assert!(json.contains(r#""type":"processing_state""#));
    assert!(json.contains(r#""state":"executing""#));
}

#[test]
fn command_error_frame_shape() {
    let frame = OutboundFrame::CommandError {
        session_name: "s1".into(),
        error: "TIMEOUT".into(),
        message: "command timed out after 500ms".into(),
    };
    let json = frame.to_json();
    assert!(json.contains(r#""type":"command_error""#));
    assert!(json.contains(r#""error":"TIMEOUT""#));
}

#[test]
fn signal_ack_frame_shape() {
    let frame = OutboundFrame::TerminalSignalSent {
        session_name: "s1".into(),
        signal: "SIGINT".into(),
    };
    let json = frame.to_json();
    assert!(json.contains(r#""type":"terminal_signal_sent""#));
    assert!(json.contains(r#""signal":"SIGINT""#));
}

#[test]
fn monitoring_connected_frame_shape() {
    let json = OutboundFrame::Connected.to_json();
    assert_eq!(json, r#"{"type":"connected"}"#);
}

#[test]
fn graceful_recovery_frame_shape() {
    let frame = OutboundFrame::GracefulRecovery {
        session_name: "s1".into(),
        message: "session state reset".into(),
    };
    let json = frame.to_json();
    assert!(json.contains(r#""type":"graceful_recovery""#));
}

#[test]
fn inbound_round_trip_all_known_types() {
    let inputs = [
        r#"{"type":"terminal_input","command":"echo 1","commandId":"a1"}"#,
        r#"{"type":"terminal_input_raw","command":"echo 2","commandId":"a2"}"#,
        r#"{"type":"terminal_signal","signal":"SIGINT"}"#,
        r#"{"type":"request_state_recovery"}"#,
    ];
    for json in inputs {
        assert!(
            serde_json::from_str::<InboundFrame>(json).is_ok(),
            "failed to parse {json}"
        );
    }
}

#[test]
fn inbound_rejects_unknown_type() {
    let json = r#"{"type":"terminal_resize","cols":120,"rows":40}"#;
    assert!(serde_json::from_str::<InboundFrame>(json).is_err());
}

#[test]
fn gating_envelope_full_shape() {
    let mut entry = BrowserCommandEntry::pending(
        "pwd",
        CommandId::parse("browser-cmd-7").unwrap(),
        Source::Human,
    );
    entry.result = ExecOutcome {
        stdout: "/home/alice".into(),
        stderr: String::new(),
        exit_code: 0,
    };

    let v = envelope::gating(std::slice::from_ref(&entry));
    let json = serde_json::to_string(&v).unwrap();

    assert!(json.contains(r#""success":false"#));
    assert!(json.contains(r#""error":"BROWSER_COMMANDS_EXECUTED""#));
    assert!(json.contains(r#""message":"User executed commands directly in browser""#));
    assert!(json.contains(r#""retryAllowed":true"#));
    assert!(json.contains(r#""command":"pwd""#));
    assert!(json.contains(r#""commandId":"browser-cmd-7""#));
    assert!(json.contains(r#""exitCode":0"#));
}

#[test]
fn legacy_claude_source_never_appears_on_egress() {
    let entry = BrowserCommandEntry {
        command: "whoami".into(),
        command_id: CommandId::new(),
        timestamp: chrono::Utc::now(),
        source: Source::Assistant,
        result: ExecOutcome::pending(),
    };
    let json = serde_json::to_string(&entry).unwrap();
    assert!(json.contains(r#""source":"assistant""#));
    assert!(!json.contains("claude"));
}
