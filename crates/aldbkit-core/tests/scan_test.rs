#![allow(clippy::unwrap_used)]
// Scan orchestration: loading-flag edges, recomputation and the idle
// lifetime of the status subscription. Time is paused throughout.

mod support;

use std::time::Duration;

use aldbkit_core::{Controller, ControllerConfig, LinkStatus, ScanPhase, ScanTarget};
use secrecy::SecretString;

use support::{A, B, C, FakeTransport, rec};

const IDLE: Duration = Duration::from_secs(20 * 60);

async fn setup(fake: &FakeTransport) -> Controller<FakeTransport> {
    let config = ControllerConfig::new(
        "ws://localhost:8123/api/websocket".parse().unwrap(),
        SecretString::from("token".to_owned()),
    );
    let controller = Controller::with_transport(config, fake.clone());
    controller.refresh_directory().await.unwrap();
    controller
}

/// A controls B on group 1; B's table is on the device but not loaded.
fn network() -> FakeTransport {
    let fake = FakeTransport::with_devices(&[(A, "Kitchen"), (B, "Hall")]);
    fake.set_table(A, vec![rec(4095, true, 1, B)]);
    fake.set_table(B, vec![rec(4095, false, 1, A)]);
    fake
}

#[tokio::test(start_paused = true)]
async fn falling_edge_reloads_and_recomputes() {
    let fake = network();
    let ctl = setup(&fake).await;
    ctl.load(&A).await.unwrap();
    ctl.refresh_findings().await.unwrap();
    assert_eq!(ctl.finding(&A, 4095).unwrap().status, LinkStatus::TargetDbNotLoaded);

    let mut status = ctl.watch_scan_status();
    ctl.request_scan(ScanTarget::Device(B)).await.unwrap();
    assert!(ctl.scan_status().any_loading);
    assert_eq!(ctl.scanner().phase(&ScanTarget::Device(B)), ScanPhase::InFlight);

    // Nothing is classified while the scan is outstanding.
    assert!(ctl.classify().is_empty());
    assert!(ctl.broken_links().is_empty());
    assert_eq!(ctl.summary().broken_links, None);

    assert!(fake.push_status(true));
    assert!(fake.push_status(false));
    let done = *status.wait_for(|s| s.completed_passes == 1).await.unwrap();

    assert!(!done.any_loading);
    assert!(ctl.table(&B).is_some(), "scanned table is re-read before recompute");
    assert_eq!(ctl.finding(&A, 4095).unwrap().status, LinkStatus::Found);
    assert_eq!(ctl.scanner().phase(&ScanTarget::Device(B)), ScanPhase::Idle);
    assert_eq!(ctl.summary().broken_links, Some(0));
}

#[tokio::test(start_paused = true)]
async fn failed_scan_request_does_not_raise_loading() {
    let fake = network();
    let ctl = setup(&fake).await;
    fake.fail("request_scan");

    assert!(ctl.request_scan(ScanTarget::All).await.is_err());
    assert!(!ctl.scan_status().any_loading);
    assert_eq!(ctl.scanner().phase(&ScanTarget::All), ScanPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn full_scan_reads_every_directory_device() {
    let fake = network();
    let ctl = setup(&fake).await;
    let mut status = ctl.watch_scan_status();

    ctl.request_scan(ScanTarget::All).await.unwrap();
    fake.add_device(C, "Porch", vec![]);
    fake.push_status(false);
    status.wait_for(|s| s.completed_passes == 1).await.unwrap();

    assert!(ctl.table(&A).is_some());
    assert!(ctl.table(&B).is_some());
    assert!(ctl.table(&C).is_some(), "directory refreshed before reload");
    assert!(ctl.broken_links().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rising_edge_alone_does_not_recompute() {
    let fake = network();
    let ctl = setup(&fake).await;
    ctl.open_view().await.unwrap();

    fake.push_status(true);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(ctl.scan_status().any_loading);
    assert_eq!(ctl.scan_status().completed_passes, 0);
    assert!(!fake.called("fetch_table"));
}

#[tokio::test(start_paused = true)]
async fn subscription_expires_after_idle_window() {
    let fake = network();
    let ctl = setup(&fake).await;
    ctl.open_view().await.unwrap();
    assert!(ctl.scanner().is_subscribed().await);
    assert_eq!(fake.subscriptions(), 1);

    tokio::time::sleep(IDLE - Duration::from_secs(1)).await;
    assert!(ctl.scanner().is_subscribed().await);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!ctl.scanner().is_subscribed().await);
    assert!(fake.status_released());
    assert!(!fake.push_status(false));

    // The next scan must subscribe again before relying on pushes.
    ctl.request_scan(ScanTarget::Device(B)).await.unwrap();
    assert_eq!(fake.subscriptions(), 2);
    assert!(ctl.scanner().is_subscribed().await);
    assert!(fake.push_status(false));
}

#[tokio::test(start_paused = true)]
async fn status_traffic_does_not_extend_the_subscription() {
    let fake = network();
    let ctl = setup(&fake).await;
    ctl.open_view().await.unwrap();

    for _ in 0..19 {
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(fake.push_status(false));
    }
    tokio::time::sleep(Duration::from_secs(59)).await;
    assert!(ctl.scanner().is_subscribed().await);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!ctl.scanner().is_subscribed().await);
    assert!(fake.status_released());
    assert_eq!(fake.subscriptions(), 1);
}

#[tokio::test(start_paused = true)]
async fn closing_the_view_releases_immediately() {
    let fake = network();
    let ctl = setup(&fake).await;
    ctl.open_view().await.unwrap();
    // Reopening while held does not subscribe twice.
    ctl.open_view().await.unwrap();
    assert_eq!(fake.subscriptions(), 1);

    ctl.close_view().await;
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(fake.status_released());
    assert!(!ctl.scanner().is_subscribed().await);
}

#[tokio::test(start_paused = true)]
async fn wait_for_scan_times_out_without_a_falling_edge() {
    let fake = network();
    let ctl = setup(&fake).await;
    ctl.request_scan(ScanTarget::Device(A)).await.unwrap();

    let err = ctl.wait_for_scan(Duration::from_secs(5)).await.unwrap_err();
    assert!(matches!(err, aldbkit_core::CoreError::Timeout { timeout_secs: 5 }));
}

#[tokio::test(start_paused = true)]
async fn scan_finished_before_acknowledgement_is_still_processed() {
    let fake = network();
    fake.finish_scans_before_ack();
    let ctl = setup(&fake).await;
    ctl.load(&A).await.unwrap();

    ctl.request_scan(ScanTarget::Device(B)).await.unwrap();
    let status = ctl.wait_for_scan(Duration::from_secs(5)).await.unwrap();

    assert!(status.is_settled());
    assert!(!ctl.scan_status().any_loading, "no falling edge will follow");
    assert_eq!(ctl.scanner().phase(&ScanTarget::Device(B)), ScanPhase::Idle);
    assert!(ctl.table(&B).is_some());
    assert_eq!(ctl.classify().len(), 2);
    assert_eq!(ctl.finding(&A, 4095).unwrap().status, LinkStatus::Found);
    assert_eq!(ctl.summary().broken_links, Some(0));
}

#[tokio::test(start_paused = true)]
async fn wait_for_scan_returns_once_tables_are_reloaded() {
    let fake = network();
    let ctl = setup(&fake).await;
    ctl.request_scan(ScanTarget::Device(B)).await.unwrap();

    let waiter = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.wait_for_scan(IDLE).await }
    });
    tokio::task::yield_now().await;
    assert!(!waiter.is_finished());

    fake.push_status(true);
    fake.push_status(false);
    let status = waiter.await.unwrap().unwrap();

    assert!(status.is_settled());
    assert_eq!(status.completed_passes, 1);
    assert!(ctl.table(&B).is_some());
}

#[tokio::test(start_paused = true)]
async fn wait_for_scan_is_immediate_when_nothing_is_outstanding() {
    let fake = network();
    let ctl = setup(&fake).await;

    let status = ctl.wait_for_scan(Duration::from_secs(1)).await.unwrap();
    assert_eq!(status.completed_passes, 0);
}
