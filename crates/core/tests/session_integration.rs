//! Session Integration Tests
//!
//! These tests drive a session through its actor with tokio's paused clock,
//! so debounce timing is exact and the tests run instantly.

mod common;

use common::{with_timeout, Recorder};
use lanchat_core::{
    Banner, EffectRouter, Envelope, LocalUser, MessageKind, Peer, PresenceState, Roster, Session,
    SessionActor, SessionConfig, SessionHandle, TransferOutcome,
};
use std::time::Duration;
use tokio::task::JoinHandle;

fn spawn(roster: Roster, connected: bool) -> (SessionHandle, JoinHandle<()>, Recorder) {
    common::init_test_logging();
    let recorder = Recorder::default();
    let router = EffectRouter::new(recorder.clone(), recorder.clone()).with_history(recorder.clone());
    let session = Session::new(SessionConfig::default(), LocalUser::new("me", "Me"), roster, connected);
    let (handle, task) = SessionActor::spawn(session, router);
    (handle, task, recorder)
}

fn direct() -> Roster {
    Roster::direct(Peer::new("bob", "Bob", "chat"))
}

fn group() -> Roster {
    Roster::group(
        "thread-1",
        Peer::new("a", "Alice", "chat"),
        vec![Peer::new("b", "Bob", "chat"), Peer::new("c", "Carol", "chat")],
    )
}

#[tokio::test(start_paused = true)]
async fn test_group_message_fans_out() {
    let (handle, _task, recorder) = spawn(group(), true);

    handle.send_message("hello").await.unwrap();
    with_timeout(handle.snapshot()).await.unwrap();

    let sends = recorder.sent_of(MessageKind::GroupMessage);
    let peers: Vec<_> = sends.iter().map(|(peer, _)| peer.as_str()).collect();
    assert_eq!(peers, vec!["a", "b", "c"]);
    assert!(sends.iter().all(|(_, env)| env == &sends[0].1));
    assert_eq!(sends[0].1.thread_id(), Some("thread-1"));
}

#[tokio::test(start_paused = true)]
async fn test_disconnected_send_logs_error() {
    let (handle, _task, recorder) = spawn(direct(), false);

    handle.send_message("hello?").await.unwrap();
    let snapshot = with_timeout(handle.snapshot()).await.unwrap();

    assert!(recorder.sent().is_empty());
    assert_eq!(recorder.logged(), vec![(MessageKind::Error, None)]);
    assert_eq!(snapshot.banner, Some(Banner::Disconnected));
}

#[tokio::test(start_paused = true)]
async fn test_debounce_settles_to_paused() {
    let (handle, _task, recorder) = spawn(direct(), true);

    for _ in 0..3 {
        handle.key_pressed(false).await.unwrap();
    }
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.key_pressed(false).await.unwrap();

    // First firing sees the late keystroke and re-arms
    tokio::time::sleep(Duration::from_millis(4500)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.presence, PresenceState::Composing);
    assert!(snapshot.timer_armed);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.presence, PresenceState::Paused);
    assert!(!snapshot.timer_armed);

    assert_eq!(recorder.chat_states_to("bob"), vec!["composing", "paused"]);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_with_empty_buffer_goes_active() {
    let (handle, _task, recorder) = spawn(direct(), true);

    handle.key_pressed(false).await.unwrap();
    handle.key_pressed(true).await.unwrap();
    // The second keystroke forces one re-arm before the state settles
    tokio::time::sleep(Duration::from_secs(11)).await;

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.presence, PresenceState::Active);
    assert_eq!(recorder.chat_states_to("bob"), vec!["composing", "active"]);
}

#[tokio::test(start_paused = true)]
async fn test_send_cancels_pending_debounce() {
    let (handle, _task, recorder) = spawn(direct(), true);

    handle.key_pressed(false).await.unwrap();
    handle.send_message("done").await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.timer_armed);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(recorder.chat_states_to("bob"), vec!["composing", "active"]);
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_timer_and_saves_history() {
    let (handle, task, recorder) = spawn(direct(), true);

    handle.send_message("first").await.unwrap();
    handle.key_pressed(false).await.unwrap();
    handle.close().await.unwrap();
    with_timeout(task).await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(
        recorder.chat_states_to("bob"),
        vec!["active", "composing", "inactive"]
    );
    assert_eq!(recorder.saved(), vec![("Bob".to_string(), 1)]);

    assert!(handle.send_message("late").await.is_err());
    assert!(handle.snapshot().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handles_closes_session() {
    let (handle, task, recorder) = spawn(direct(), true);

    handle.send_message("bye").await.unwrap();
    drop(handle);
    with_timeout(task).await.unwrap();

    assert_eq!(recorder.chat_states_to("bob").last().map(String::as_str), Some("inactive"));
    assert_eq!(recorder.saved(), vec![("Bob".to_string(), 1)]);
}

#[tokio::test(start_paused = true)]
async fn test_status_wire_updates_banner() {
    let (handle, _task, recorder) = spawn(direct(), true);

    handle.receive_wire("bob", "status||0||1||status||away").await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.banner, Some(Banner::Away));

    handle.receive_wire("bob", "status||0||1||status||brb").await.unwrap();
    handle.connection_changed(false).await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.banner, Some(Banner::Disconnected));

    let banners: Vec<_> = recorder
        .presented()
        .into_iter()
        .filter_map(|e| match e {
            lanchat_core::Effect::Banner(b) => Some(b),
            _ => None,
        })
        .collect();
    // initial, away, brb (still away), disconnected
    assert_eq!(
        banners,
        vec![None, Some(Banner::Away), Some(Banner::Away), Some(Banner::Disconnected)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_outgoing_transfer_cancel() {
    let (handle, _task, recorder) = spawn(group(), true);

    handle.send_file("/home/me/notes.txt", 2048).await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.transfers.len(), 1);
    let id = snapshot.transfers[0].id.clone();

    let offers = recorder.sent_of(MessageKind::File);
    assert_eq!(offers.len(), 3);
    assert_eq!(offers[0].1.data("fileop"), Some("request"));
    assert_eq!(offers[0].1.data("filename"), Some("notes.txt"));

    handle.cancel_transfer(id.clone()).await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.transfers.is_empty());

    // A late accept cannot revive a cancelled transfer
    let late_accept = Envelope::new(MessageKind::File)
        .with_data("mode", "receive")
        .with_data("fileop", "accept")
        .with_data("fileid", id.as_str());
    handle
        .receive(MessageKind::File, Some("b"), late_accept)
        .await
        .unwrap();

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.transfers.is_empty());

    let cancels: Vec<_> = recorder
        .sent_of(MessageKind::File)
        .into_iter()
        .filter(|(_, env)| env.data("fileop") == Some("cancel"))
        .collect();
    assert_eq!(cancels.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_incoming_offer_accept() {
    let (handle, _task, recorder) = spawn(direct(), true);

    let wire = Envelope::new(MessageKind::File)
        .with_data("mode", "send")
        .with_data("fileop", "request")
        .with_data("fileid", "abc")
        .with_data("filename", "../../etc/passwd")
        .with_data("filesize", "10")
        .encode();
    handle.receive_wire("bob", &wire).await.unwrap();

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.transfers[0].file_name, "passwd");

    handle.accept_transfer("abc".into()).await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.transfers[0].outcome, TransferOutcome::Accepted);

    let replies = recorder.sent_of(MessageKind::File);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].0, "bob");
    assert_eq!(replies[0].1.data("fileop"), Some("accept"));
    assert_eq!(replies[0].1.data("mode"), Some("receive"));
}

#[tokio::test(start_paused = true)]
async fn test_declined_offers_do_not_accumulate() {
    let (handle, _task, recorder) = spawn(direct(), true);

    for n in 0..50 {
        let offer = Envelope::new(MessageKind::File)
            .with_data("mode", "send")
            .with_data("fileop", "request")
            .with_data("fileid", format!("offer-{}", n));
        handle.receive(MessageKind::File, Some("bob"), offer).await.unwrap();
        handle.decline_transfer(format!("offer-{}", n).as_str().into()).await.unwrap();
    }

    let snapshot = with_timeout(handle.snapshot()).await.unwrap();
    assert!(snapshot.transfers.is_empty());

    let declines = recorder
        .sent_of(MessageKind::File)
        .into_iter()
        .filter(|(_, env)| env.data("fileop") == Some("decline"))
        .count();
    assert_eq!(declines, 50);
}
