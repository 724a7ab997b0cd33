// ABOUTME: End-to-end tests of the application root over an in-memory control channel
// Login, typing, output routing, notices, relogin after loss and resize synchronisation

mod common;

use common::{app_with, pump_until, sent_frames, ScriptedConnector, Step};
use pretty_assertions::assert_eq;
use webssh_client::app::NoticeLevel;
use webssh_client::session::{SearchDirection, SearchMatch, Viewport};
use webssh_client::transport::{ConnectRequest, ConnectionState};

const WINDOW: Viewport = Viewport::new(30, 100);

fn login() -> ConnectRequest {
    ConnectRequest {
        host: "10.0.0.7".to_string(),
        port: 22,
        username: "deploy".to_string(),
        password: "hunter2".to_string(),
    }
}

fn resize_frames(frames: &[(String, String)]) -> Vec<String> {
    frames
        .iter()
        .filter(|(destination, _)| destination == "/app/ssh/resize")
        .map(|(_, body)| body.clone())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_login_while_offline_connects_then_sends_credentials() {
    let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept]);
    let mut app = app_with(connector, WINDOW);
    assert!(app.sessions.is_empty());

    let ready = app.login(login());
    assert!(app.has_pending_login());
    pump_until(&mut app, |app| app.transport.is_open()).await;
    assert_eq!(ready.await.unwrap(), Ok(()));

    let mut peer = peers.recv().await.unwrap();
    let frames = sent_frames(&mut peer);
    assert_eq!(
        frames[0],
        (
            "/app/ssh/connect".to_string(),
            r#"{"host":"10.0.0.7","port":22,"username":"deploy","password":"hunter2"}"#.to_string()
        )
    );
    // A tab is opened for the new remote session and sized right away
    assert_eq!(app.sessions.len(), 1);
    assert_eq!(resize_frames(&frames), vec![r#"{"cols":98,"rows":26}"#.to_string()]);
    assert!(!app.has_pending_login());
}

#[tokio::test(start_paused = true)]
async fn test_typed_input_and_output_round_trip() {
    let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept]);
    let mut app = app_with(connector, WINDOW);
    let tab = app.new_session(None);

    app.connect();
    pump_until(&mut app, |app| app.transport.is_open()).await;
    let mut peer = peers.recv().await.unwrap();
    peer.drain_commands();

    assert!(app.type_input("uptime\r"));
    let mut sent = Vec::new();
    pump_until(&mut app, |_| {
        sent.extend(sent_frames(&mut peer));
        !sent.is_empty()
    })
    .await;
    assert_eq!(
        sent,
        vec![("/app/ssh/input".to_string(), r#"{"data":"uptime\r"}"#.to_string())]
    );

    peer.deliver(r#"{"type":"output","data":"up 3 days"}"#);
    pump_until(&mut app, |app| {
        app.sessions
            .get(tab)
            .is_some_and(|session| session.sink.contents().contains("up 3 days"))
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_input_for_a_closed_tab_is_dropped() {
    let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept]);
    let mut app = app_with(connector, WINDOW);
    let tab = app.new_session(None);

    app.connect();
    pump_until(&mut app, |app| app.transport.is_open()).await;
    let mut peer = peers.recv().await.unwrap();

    assert!(app.type_input("exit\r"));
    assert!(app.close_session(tab));
    // Flush the queued keystroke through the loop
    app.new_session(None);
    assert!(app.type_input("ls\r"));
    let mut inputs = Vec::new();
    pump_until(&mut app, |_| {
        inputs.extend(
            sent_frames(&mut peer)
                .into_iter()
                .filter(|(destination, _)| destination == "/app/ssh/input"),
        );
        !inputs.is_empty()
    })
    .await;

    assert_eq!(inputs[0].1, r#"{"data":"ls\r"}"#);
}

#[tokio::test(start_paused = true)]
async fn test_gateway_frames_raise_notices() {
    let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept]);
    let mut app = app_with(connector, WINDOW);
    app.new_session(None);

    app.connect();
    pump_until(&mut app, |app| app.transport.is_open()).await;
    let peer = peers.recv().await.unwrap();

    peer.deliver(r#"{"type":"connected","message":"SSH connection established"}"#);
    pump_until(&mut app, |app| {
        app.notices
            .latest()
            .is_some_and(|notice| notice.level == NoticeLevel::Success)
    })
    .await;

    peer.deliver(r#"{"type":"error","message":"Authentication failed"}"#);
    pump_until(&mut app, |app| {
        app.notices
            .latest()
            .is_some_and(|notice| notice.level == NoticeLevel::Error)
    })
    .await;
    assert_eq!(
        app.notices.latest().map(|notice| notice.message.as_str()),
        Some("Authentication failed")
    );
    assert!(app.transport.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_login_is_repeated_after_the_channel_comes_back() {
    let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept, Step::Accept]);
    let mut app = app_with(connector.clone(), WINDOW);

    app.login(login());
    pump_until(&mut app, |app| app.transport.is_open()).await;
    let first = peers.recv().await.unwrap();
    assert!(first.close("gateway restarted"));

    pump_until(&mut app, |app| app.transport.state() == ConnectionState::Reconnecting).await;
    assert!(app.has_pending_login());
    assert_eq!(
        app.notices.latest().map(|notice| notice.level),
        Some(NoticeLevel::Warning)
    );

    pump_until(&mut app, |app| app.transport.is_open()).await;
    assert_eq!(connector.attempts(), 2);

    let mut second = peers.recv().await.unwrap();
    let logins: Vec<_> = sent_frames(&mut second)
        .into_iter()
        .filter(|(destination, _)| destination == "/app/ssh/connect")
        .collect();
    assert_eq!(logins.len(), 1);
    // The existing tab is reused
    assert_eq!(app.sessions.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_disconnect_forgets_the_login() {
    let (connector, _peers) = ScriptedConnector::new(vec![Step::Accept]);
    let mut app = app_with(connector, WINDOW);

    app.login(login());
    pump_until(&mut app, |app| app.transport.is_open()).await;
    app.disconnect();

    assert_eq!(app.transport.state(), ConnectionState::Idle);
    assert!(!app.has_pending_login());
    assert_eq!(app.status().reconnect_in, None);
}

#[tokio::test(start_paused = true)]
async fn test_fullscreen_round_trip_sends_two_matching_resizes() {
    let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept]);
    let mut app = app_with(connector, WINDOW);
    let tab = app.new_session(None);
    let normal = app.sessions.get(tab).unwrap().viewport;
    assert_eq!(normal, Viewport::new(26, 98));

    app.connect();
    pump_until(&mut app, |app| app.transport.is_open()).await;
    let mut peer = peers.recv().await.unwrap();
    peer.drain_commands();

    assert!(app.toggle_fullscreen());
    pump_until(&mut app, |app| !app.resize.is_settling()).await;
    assert_eq!(app.sessions.get(tab).unwrap().viewport, WINDOW);

    assert!(app.exit_fullscreen());
    pump_until(&mut app, |app| !app.resize.is_settling()).await;
    assert_eq!(app.sessions.get(tab).unwrap().viewport, normal);

    assert_eq!(
        resize_frames(&sent_frames(&mut peer)),
        vec![
            r#"{"cols":100,"rows":30}"#.to_string(),
            r#"{"cols":98,"rows":26}"#.to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rapid_fullscreen_toggles_settle_once() {
    let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept]);
    let mut app = app_with(connector, WINDOW);
    app.new_session(None);

    app.connect();
    pump_until(&mut app, |app| app.transport.is_open()).await;
    let mut peer = peers.recv().await.unwrap();
    peer.drain_commands();

    app.toggle_fullscreen();
    app.toggle_fullscreen();
    app.toggle_fullscreen();
    pump_until(&mut app, |app| !app.resize.is_settling()).await;

    assert_eq!(
        resize_frames(&sent_frames(&mut peer)),
        vec![r#"{"cols":100,"rows":30}"#.to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_resize_while_offline_only_changes_local_geometry() {
    let (connector, _peers) = ScriptedConnector::new(vec![]);
    let mut app = app_with(connector, WINDOW);
    let tab = app.new_session(None);

    let fitted = app.window_resized(Viewport::new(50, 160));
    assert_eq!(fitted, Some(Viewport::new(46, 158)));
    assert_eq!(app.sessions.get(tab).unwrap().viewport, Viewport::new(46, 158));
    assert_eq!(app.transport.state(), ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_switching_tabs_resyncs_geometry() {
    let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept]);
    let mut app = app_with(connector, WINDOW);
    let first = app.new_session(Some("web"));
    app.new_session(Some("db"));

    app.connect();
    pump_until(&mut app, |app| app.transport.is_open()).await;
    let mut peer = peers.recv().await.unwrap();
    peer.drain_commands();

    assert!(app.activate_session(first));
    assert_eq!(
        resize_frames(&sent_frames(&mut peer)),
        vec![r#"{"cols":98,"rows":26}"#.to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_search_steps_through_the_active_tab() {
    let (connector, _peers) = ScriptedConnector::new(vec![]);
    let mut app = app_with(connector, WINDOW);
    app.new_session(None);
    app.sessions
        .write_to_active(b"alpha needle\r\nbeta\r\ngamma NEEDLE\r\n");

    app.open_search();
    assert!(app.is_searching());
    // Nothing typed yet
    assert_eq!(app.search_step(SearchDirection::Next), None);
    assert!(!app.search().unwrap().missed);

    for c in "needle".chars() {
        app.search_push(c);
    }
    let first = SearchMatch { line: 0, col: 6, len: 6 };
    let second = SearchMatch { line: 2, col: 6, len: 6 };
    assert_eq!(app.search_step(SearchDirection::Next), Some(first));
    assert_eq!(app.search_step(SearchDirection::Next), Some(second));
    assert_eq!(app.search_step(SearchDirection::Previous), Some(first));
    assert_eq!(app.search().unwrap().found, Some(first));

    app.search_pop();
    app.search_push('x');
    assert_eq!(app.search_step(SearchDirection::Next), None);
    assert!(app.search().unwrap().missed);

    app.close_search();
    assert!(!app.is_searching());
    app.open_search();
    assert_eq!(app.search().unwrap().query, "needlx");
}

#[tokio::test(start_paused = true)]
async fn test_switching_tabs_ends_the_search() {
    let (connector, _peers) = ScriptedConnector::new(vec![]);
    let mut app = app_with(connector, WINDOW);
    let first = app.new_session(Some("web"));
    app.new_session(Some("db"));

    app.open_search();
    assert!(app.activate_session(first));
    assert!(!app.is_searching());
}

#[tokio::test(start_paused = true)]
async fn test_log_panel_keeps_connection_history() {
    let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept]);
    let mut app = app_with(connector, WINDOW);
    app.new_session(None);

    assert!(!app.is_log_visible());
    assert!(app.toggle_log());

    app.connect();
    pump_until(&mut app, |app| app.transport.is_open()).await;
    let peer = peers.recv().await.unwrap();
    peer.deliver(r#"{"type":"error","message":"Authentication failed"}"#);
    pump_until(&mut app, |app| {
        app.notices
            .log()
            .any(|entry| entry.message == "Authentication failed")
    })
    .await;

    let newest = app.notices.log().next_back().unwrap();
    assert_eq!(newest.level, NoticeLevel::Error);
    assert!(newest.line().ends_with("] Authentication failed"));
    assert!(!app.toggle_log());
}
