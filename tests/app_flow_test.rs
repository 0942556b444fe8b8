//! End-to-end flows through the command layer with fake Bluetooth backends.

mod common;

use std::sync::Arc;

use common::{candidate, open_db, FixedBackend, ManualClock, ScriptedConnector};
use emotion_tracker_lib::{
    bluetooth::{ConnectionState, SignalQuality, UnavailableBackend, UnsupportedConnector},
    commands,
    error::{ConnectError, ScanError},
    settings::SettingsStore,
    AppState,
};
use tempfile::TempDir;

fn app_with(dir: &TempDir, backend: Arc<FixedBackend>, connector: ScriptedConnector) -> AppState {
    let settings = SettingsStore::new(dir.path().join("settings.json")).expect("settings");
    AppState::new(
        open_db(dir, ManualClock::new()),
        backend,
        Arc::new(connector),
        settings,
    )
}

fn app(dir: &TempDir, connector: ScriptedConnector) -> AppState {
    let backend = FixedBackend::new(vec![
        candidate("band-c", None, -90),
        candidate("band-a", Some("Mood Band A"), -58),
        candidate("band-b", Some("Mood Band B"), -75),
    ]);
    app_with(dir, backend, connector)
}

mod app_flow_tests {
    use super::*;

    #[tokio::test]
    async fn scan_connect_and_disconnect() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = app(&dir, ScriptedConnector::default());

        let views = commands::scan_devices(&state, Some(1000)).await.expect("scan");
        let ids: Vec<&str> = views.iter().map(|view| view.candidate.id.as_str()).collect();
        assert_eq!(ids, vec!["band-a", "band-b", "band-c"]);
        assert_eq!(views[0].quality, SignalQuality::Excellent);
        assert_eq!(views[2].candidate.label(), "Unnamed Device");
        assert!(views.iter().all(|view| !view.disabled));

        let connected = commands::connect_device(&state, "band-a".into())
            .await
            .expect("connect");
        assert!(matches!(connected, ConnectionState::Connected { ref device } if device.id == "band-a"));

        let views = commands::get_candidates(&state);
        let disabled: Vec<bool> = views.iter().map(|view| view.disabled).collect();
        assert_eq!(disabled, vec![false, true, true]);

        let err = commands::connect_device(&state, "band-b".into())
            .await
            .expect_err("second device is busy");
        assert_eq!(
            err,
            ConnectError::ConnectionBusy {
                active: "band-a".into()
            }
            .to_string()
        );

        commands::disconnect_device(&state).await.expect("disconnect");
        assert_eq!(commands::get_connection_state(&state), ConnectionState::Idle);
        assert!(commands::get_candidates(&state).iter().all(|view| !view.disabled));
    }

    #[tokio::test]
    async fn connected_device_missing_from_rescan_is_still_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = FixedBackend::new(vec![
            candidate("a", Some("Mood Band A"), -58),
            candidate("b", Some("Mood Band B"), -75),
        ]);
        let state = app_with(&dir, backend.clone(), ScriptedConnector::default());
        commands::scan_devices(&state, Some(1000)).await.expect("scan");
        commands::connect_device(&state, "a".into())
            .await
            .expect("connect");

        // A connected peripheral stops advertising.
        backend.replace(vec![candidate("b", Some("Mood Band B"), -75)]);
        commands::scan_devices(&state, Some(1000)).await.expect("rescan");

        let again = commands::connect_device(&state, "a".into())
            .await
            .expect("same device is a no-op");
        assert!(matches!(again, ConnectionState::Connected { ref device } if device.id == "a"));

        backend.replace(Vec::new());
        commands::scan_devices(&state, Some(1000)).await.expect("empty rescan");

        let err = commands::connect_device(&state, "b".into())
            .await
            .expect_err("slot is taken");
        assert_eq!(
            err,
            ConnectError::ConnectionBusy { active: "a".into() }.to_string()
        );
        assert_eq!(commands::get_connection_state(&state).device_id(), Some("a"));
    }

    #[tokio::test]
    async fn connecting_to_an_unscanned_device_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = app(&dir, ScriptedConnector::default());

        let err = commands::connect_device(&state, "band-a".into())
            .await
            .expect_err("nothing scanned yet");

        assert_eq!(err, ConnectError::UnknownDevice("band-a".into()).to_string());
        assert_eq!(commands::get_connection_state(&state), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn failed_connection_must_be_acknowledged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = app(&dir, ScriptedConnector::failing(&["band-a"]));
        commands::scan_devices(&state, None).await.expect("scan");

        let err = commands::connect_device(&state, "band-a".into())
            .await
            .expect_err("refused");
        assert!(err.contains("band-a refused the connection"));
        assert!(matches!(
            commands::get_connection_state(&state),
            ConnectionState::Failed { .. }
        ));

        let blocked = commands::connect_device(&state, "band-b".into())
            .await
            .expect_err("failure not acknowledged");
        assert_eq!(
            blocked,
            ConnectError::UnacknowledgedFailure("band-a".into()).to_string()
        );

        assert_eq!(
            commands::acknowledge_connection_failure(&state),
            ConnectionState::Idle
        );
        commands::connect_device(&state, "band-b".into())
            .await
            .expect("connect after acknowledging");
    }

    #[tokio::test]
    async fn recorded_readings_surface_in_recent_windows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = app(&dir, ScriptedConnector::default());

        commands::record_reading(&state, "calm".into(), 0.9, 100)
            .await
            .expect("record");
        let recorded = commands::record_reading(&state, "stressed".into(), 0.3, 900)
            .await
            .expect("record");
        assert_eq!(recorded.alert_ids.len(), 2);

        let readings = commands::get_recent_readings(&state, None).await.expect("readings");
        assert_eq!(readings.len(), 2);

        let alerts = commands::get_recent_alerts(&state, Some(1)).await.expect("alerts");
        assert_eq!(alerts.len(), 1);
        commands::acknowledge_alert(&state, alerts[0].id)
            .await
            .expect("acknowledge");
        let err = commands::acknowledge_alert(&state, 42).await.expect_err("missing");
        assert!(err.contains("42"));

        let id = commands::add_alert(&state, "manual".into(), "checked in".into())
            .await
            .expect("add alert");
        let newest = commands::get_recent_alerts(&state, Some(1)).await.expect("alerts");
        assert_eq!(newest[0].id, id);
    }

    #[tokio::test]
    async fn build_without_bluetooth_reports_unavailable_scanner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = SettingsStore::new(dir.path().join("settings.json")).expect("settings");
        let state = AppState::new(
            open_db(&dir, ManualClock::new()),
            Arc::new(UnavailableBackend),
            Arc::new(UnsupportedConnector),
            settings,
        );

        let err = commands::scan_devices(&state, None).await.expect_err("no scanner");

        assert_eq!(err, ScanError::ScannerUnavailable.to_string());
        assert!(commands::get_candidates(&state).is_empty());
    }
}
