mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use btuuid::BluetoothUuid;
use common::{ADDRESS, Call, MockTransport, Op, init_tracing};
use xsens_dot_async::{
    Battery, CharacteristicId, Codec, DecodeErrorKind, DeviceControl, DeviceInfo, DeviceReport,
    ErrorKind, FilterProfile, MeasurementControl, PayloadMode, Session, SessionOptions,
    SessionState, VisitIndex,
};

async fn open_session(mock: &MockTransport) -> Session<MockTransport> {
    init_tracing();
    let mut session = Session::new(mock.clone(), ADDRESS);
    session.open().await.unwrap();
    mock.clear_calls();
    session
}

fn battery_log() -> (Arc<Mutex<Vec<u8>>>, impl FnMut(Battery) + Send + 'static) {
    let levels = Arc::new(Mutex::new(Vec::new()));
    let consumer = {
        let levels = levels.clone();
        move |battery: Battery| levels.lock().unwrap().push(battery.level)
    };
    (levels, consumer)
}

#[tokio::test]
async fn open_close_lifecycle() {
    init_tracing();
    let mock = MockTransport::new();
    let mut session = Session::new(mock.clone(), ADDRESS);
    assert_eq!(session.state(), SessionState::Closed);

    session.open().await.unwrap();
    assert_eq!(session.state(), SessionState::Open);
    assert_eq!(mock.calls(), vec![Call::Connect(ADDRESS.to_string())]);

    session.close().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(mock.calls().last(), Some(&Call::Disconnect));

    let err = session.read::<Battery>().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = session.open().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    // closing twice is a no-op
    session.close().await;
    assert_eq!(
        mock.calls().iter().filter(|call| **call == Call::Disconnect).count(),
        1
    );
}

#[tokio::test]
async fn closed_session_rejects_operations_without_transport_calls() {
    init_tracing();
    let mock = MockTransport::new();
    let mut session = Session::new(mock.clone(), ADDRESS);

    let (_, consumer) = battery_log();
    let results = [
        session.read::<Battery>().await.map(drop),
        session.write(&DeviceControl::default()).await,
        session.subscribe(consumer).await,
        session.unsubscribe(CharacteristicId::Battery).await,
    ];
    for result in results {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidState);
    }
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn failed_connect_stays_closed_and_can_retry() {
    init_tracing();
    let mock = MockTransport::unreachable();
    let mut session = Session::new(mock.clone(), ADDRESS);

    let err = session.open().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectFailed);
    assert_eq!(session.state(), SessionState::Closed);

    let err = session.open().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectFailed);
    assert_eq!(mock.calls().len(), 2);
}

#[tokio::test]
async fn connect_timeout_stays_closed() {
    init_tracing();
    let mock = MockTransport::new();
    mock.hang(Op::Connect);
    let options = SessionOptions::default().with_timeout(Duration::from_millis(20));
    let mut session = Session::with_options(mock.clone(), ADDRESS, options);

    let err = session.open().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn cancelled_open_stays_closed() {
    init_tracing();
    let mock = MockTransport::new();
    mock.hang(Op::Connect);
    let mut session = Session::new(mock.clone(), ADDRESS);

    let result = tokio::time::timeout(Duration::from_millis(20), session.open()).await;
    assert!(result.is_err());
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn output_rate_round_trips_through_device_control() {
    let mock = MockTransport::new();
    let mut session = open_session(&mock).await;

    session.set_output_rate(10).await.unwrap();

    let writes = mock.writes(CharacteristicId::DeviceControl);
    assert_eq!(writes.len(), 1);
    let written = DeviceControl::decode(&writes[0]).unwrap();
    assert_eq!(written.visit_index, VisitIndex::OUTPUT_RATE);
    assert_eq!(written.output_rate, 10);
    assert_eq!(written.tag(), "Xsens DOT");

    assert_eq!(session.device_control().await.unwrap().output_rate, 10);
}

#[tokio::test]
async fn unsupported_output_rate_is_rejected_before_transport() {
    let mock = MockTransport::new();
    let mut session = open_session(&mock).await;

    let err = session.set_output_rate(11).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn device_control_operations() {
    let mock = MockTransport::new();
    let mut session = open_session(&mock).await;

    session.identify().await.unwrap();
    let control = session.device_control().await.unwrap();
    assert_eq!(control.visit_index, VisitIndex::IDENTIFY);
    assert_eq!(control.identifying, 1);

    session.set_power_on_by_usb_plug_in(true).await.unwrap();
    let control = session.device_control().await.unwrap();
    assert_eq!(control.visit_index, VisitIndex::POWER);
    assert!(control.power_options.power_on_by_usb_plug_in());
    assert!(!control.power_options.power_off());

    session.set_power_on_by_usb_plug_in(false).await.unwrap();
    session.power_off().await.unwrap();
    let control = session.device_control().await.unwrap();
    assert!(control.power_options.power_off());
    assert!(!control.power_options.power_on_by_usb_plug_in());

    session
        .set_filter_profile(FilterProfile::Dynamic)
        .await
        .unwrap();
    let control = session.device_control().await.unwrap();
    assert_eq!(control.visit_index, VisitIndex::FILTER_PROFILE);
    assert_eq!(control.filter_profile, FilterProfile::Dynamic);

    session.set_device_tag("left wrist").await.unwrap();
    assert_eq!(session.device_control().await.unwrap().tag(), "left wrist");

    let err = session
        .set_device_tag("a tag that is far too long")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    session.set_output_rate(120).await.unwrap();
    session.reset_output_rate().await.unwrap();
    assert_eq!(session.device_control().await.unwrap().output_rate, 60);
}

#[tokio::test]
async fn measurement_and_heading_commands() {
    let mock = MockTransport::new();
    let mut session = open_session(&mock).await;

    session
        .start_measurement(PayloadMode::CompleteQuaternion)
        .await
        .unwrap();
    session
        .stop_measurement(PayloadMode::CompleteQuaternion)
        .await
        .unwrap();
    assert_eq!(
        mock.writes(CharacteristicId::MeasurementControl),
        vec![vec![1, 1, 3], vec![1, 0, 3]]
    );
    assert_eq!(
        session.read::<MeasurementControl>().await.unwrap(),
        MeasurementControl::stop(PayloadMode::CompleteQuaternion)
    );

    session.reset_heading().await.unwrap();
    session.revert_heading().await.unwrap();
    assert_eq!(
        mock.writes(CharacteristicId::OrientationResetControl),
        vec![vec![1, 0], vec![7, 0]]
    );

    mock.set_value(vec![1], CharacteristicId::OrientationResetStatus);
    assert_eq!(session.heading_reset_status().await.unwrap().result, 1);
    assert_eq!(session.battery().await.unwrap().level, 80);
}

#[tokio::test]
async fn rejected_write_is_reported() {
    let mock = MockTransport::new();
    mock.reject_writes();
    let mut session = open_session(&mock).await;

    let err = session.set_output_rate(30).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RejectedByDevice);
    assert_eq!(session.state(), SessionState::Open);
}

#[tokio::test]
async fn unsupported_operations_are_not_permitted() {
    let mock = MockTransport::new();
    let mut session = open_session(&mock).await;

    let err = session.write(&DeviceInfo::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotPermitted);

    let err = session
        .read_value(CharacteristicId::LongPayload)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotPermitted);

    let err = session
        .subscribe(|_: DeviceControl| {})
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotPermitted);
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn malformed_read_is_a_length_mismatch() {
    let mock = MockTransport::new();
    mock.set_value(vec![1, 2, 3], CharacteristicId::Battery);
    let mut session = open_session(&mock).await;

    let err = session.battery().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LengthMismatch);
    assert_eq!(
        err.get_ref().map(|err| err.kind()),
        Some(DecodeErrorKind::LengthMismatch {
            expected: 2,
            actual: 3
        })
    );
}

#[tokio::test]
async fn read_timeout_keeps_session_open() {
    init_tracing();
    let mock = MockTransport::new();
    let options = SessionOptions::default().with_timeout(Duration::from_millis(20));
    let mut session = Session::with_options(mock.clone(), ADDRESS, options);
    session.open().await.unwrap();
    mock.hang(Op::Read);

    let err = session.battery().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(session.state(), SessionState::Open);
    session.reset_heading().await.unwrap();
}

#[tokio::test]
async fn subscribing_twice_replaces_the_consumer() {
    let mock = MockTransport::new();
    let mut session = open_session(&mock).await;

    let (first, f) = battery_log();
    let (second, g) = battery_log();
    session.subscribe(f).await.unwrap();
    session.subscribe(g).await.unwrap();
    assert!(session.is_subscribed(CharacteristicId::Battery));

    mock.notify(CharacteristicId::Battery, vec![55, 1]);
    session.reset_heading().await.unwrap();

    assert!(first.lock().unwrap().is_empty());
    assert_eq!(*second.lock().unwrap(), vec![55]);
    assert_eq!(
        mock.calls()
            .iter()
            .filter(|call| **call == Call::Subscribe(CharacteristicId::Battery))
            .count(),
        1
    );
}

#[tokio::test]
async fn order_is_preserved_around_a_malformed_notification() {
    let mock = MockTransport::new();
    let mut session = open_session(&mock).await;

    let failures = Arc::new(Mutex::new(Vec::new()));
    session.on_decode_error({
        let failures = failures.clone();
        move |id, err| failures.lock().unwrap().push((id, err.kind()))
    });
    let (levels, consumer) = battery_log();
    session.subscribe(consumer).await.unwrap();

    mock.notify(CharacteristicId::Battery, vec![10, 0]);
    mock.notify(CharacteristicId::Battery, vec![20, 0, 0]);
    mock.notify(CharacteristicId::Battery, vec![30, 0]);
    session.reset_heading().await.unwrap();

    assert_eq!(*levels.lock().unwrap(), vec![10, 30]);
    assert_eq!(
        *failures.lock().unwrap(),
        vec![(
            CharacteristicId::Battery,
            DecodeErrorKind::LengthMismatch {
                expected: 2,
                actual: 3
            }
        )]
    );

    mock.notify(CharacteristicId::Battery, vec![40, 0]);
    session.reset_heading().await.unwrap();
    assert_eq!(*levels.lock().unwrap(), vec![10, 30, 40]);
}

#[tokio::test]
async fn notifications_are_routed_by_characteristic() {
    let mock = MockTransport::new();
    let mut session = open_session(&mock).await;

    let reports = Arc::new(Mutex::new(Vec::new()));
    session
        .subscribe_value(CharacteristicId::DeviceReport, {
            let reports = reports.clone();
            move |value| reports.lock().unwrap().push(value)
        })
        .await
        .unwrap();
    let (levels, consumer) = battery_log();
    session.subscribe(consumer).await.unwrap();

    let mut report = vec![0; 36];
    report[0] = 5;
    mock.notify(CharacteristicId::DeviceReport, report.clone());
    mock.notify_uuid(BluetoothUuid::Uuid16(0x2a19u16.into()), vec![99]);
    mock.notify(CharacteristicId::Battery, vec![70, 1]);
    mock.notify(CharacteristicId::ShortPayload, vec![0; 16]);
    session.reset_heading().await.unwrap();

    assert_eq!(*levels.lock().unwrap(), vec![70]);
    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].characteristic(), CharacteristicId::DeviceReport);
    assert_eq!(reports[0].encode(), report);
    assert!(matches!(
        &reports[0],
        xsens_dot_async::CharacteristicValue::DeviceReport(DeviceReport { .. })
    ));
}

#[tokio::test]
async fn unsubscribe_is_idempotent() {
    let mock = MockTransport::new();
    let mut session = open_session(&mock).await;

    session
        .unsubscribe(CharacteristicId::Battery)
        .await
        .unwrap();
    assert!(mock.calls().is_empty());

    let (levels, consumer) = battery_log();
    session.subscribe(consumer).await.unwrap();
    session
        .unsubscribe(CharacteristicId::Battery)
        .await
        .unwrap();
    session
        .unsubscribe(CharacteristicId::Battery)
        .await
        .unwrap();
    assert!(!session.is_subscribed(CharacteristicId::Battery));
    assert_eq!(
        mock.calls(),
        vec![
            Call::Subscribe(CharacteristicId::Battery),
            Call::Unsubscribe(CharacteristicId::Battery),
        ]
    );

    // late notifications after unsubscribe are dropped
    mock.notify(CharacteristicId::Battery, vec![1, 0]);
    session.reset_heading().await.unwrap();
    assert!(levels.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_subscribe_is_rolled_back() {
    let mock = MockTransport::new();
    mock.fail_subscribe();
    let mut session = open_session(&mock).await;

    let (levels, consumer) = battery_log();
    let err = session.subscribe(consumer).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(!session.is_subscribed(CharacteristicId::Battery));

    mock.notify(CharacteristicId::Battery, vec![1, 0]);
    session.reset_heading().await.unwrap();
    assert!(levels.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_subscribe_is_rolled_back() {
    let mock = MockTransport::new();
    mock.hang(Op::Subscribe);
    let mut session = open_session(&mock).await;

    let (levels, consumer) = battery_log();
    let result = tokio::time::timeout(Duration::from_millis(20), session.subscribe(consumer)).await;
    assert!(result.is_err());
    assert!(!session.is_subscribed(CharacteristicId::Battery));

    mock.notify(CharacteristicId::Battery, vec![1, 0]);
    session.reset_heading().await.unwrap();
    assert!(levels.lock().unwrap().is_empty());
    assert_eq!(session.state(), SessionState::Open);
}

#[tokio::test]
async fn disconnect_during_read_closes_the_session() {
    let mock = MockTransport::new();
    let mut session = open_session(&mock).await;

    let disconnects = Arc::new(Mutex::new(Vec::new()));
    session.on_disconnect({
        let disconnects = disconnects.clone();
        move |err| disconnects.lock().unwrap().push(err.kind())
    });
    let (levels, consumer) = battery_log();
    session.subscribe(consumer).await.unwrap();
    mock.hang(Op::Read);

    let (result, ()) = tokio::join!(session.read::<DeviceControl>(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        mock.notify(CharacteristicId::Battery, vec![42, 0]);
        mock.drop_link();
    });

    assert_eq!(result.unwrap_err().kind(), ErrorKind::UnexpectedDisconnect);
    assert_eq!(*levels.lock().unwrap(), vec![42]);
    assert_eq!(session.state(), SessionState::Closed);
    assert!(!session.is_subscribed(CharacteristicId::Battery));
    assert_eq!(
        *disconnects.lock().unwrap(),
        vec![ErrorKind::UnexpectedDisconnect]
    );
    assert_eq!(mock.calls().last(), Some(&Call::Disconnect));

    let err = session.read::<Battery>().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn disconnect_while_idle_is_reported_to_the_next_operation() {
    let mock = MockTransport::new();
    let mut session = open_session(&mock).await;

    mock.drop_link();
    let err = session.battery().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedDisconnect);
    assert_eq!(session.state(), SessionState::Closed);

    let err = session.battery().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn idle_disconnect_closes_the_session_when_queried() {
    let mock = MockTransport::new();
    let mut session = open_session(&mock).await;

    let disconnects = Arc::new(Mutex::new(0));
    session.on_disconnect({
        let disconnects = disconnects.clone();
        move |_| *disconnects.lock().unwrap() += 1
    });
    let (levels, consumer) = battery_log();
    session.subscribe(consumer).await.unwrap();

    mock.notify(CharacteristicId::Battery, vec![64, 0]);
    mock.drop_link();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(session.state(), SessionState::Closed);
    assert!(!session.is_subscribed(CharacteristicId::Battery));
    assert_eq!(*levels.lock().unwrap(), vec![64]);
    assert_eq!(*disconnects.lock().unwrap(), 1);
    assert_eq!(mock.calls().last(), Some(&Call::Disconnect));

    let err = session.battery().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(*disconnects.lock().unwrap(), 1);
}

#[tokio::test]
async fn cancelled_unsubscribe_is_repeated_on_close() {
    let mock = MockTransport::new();
    let mut session = open_session(&mock).await;
    let (levels, consumer) = battery_log();
    session.subscribe(consumer).await.unwrap();

    mock.hang(Op::Unsubscribe);
    let result = tokio::time::timeout(
        Duration::from_millis(20),
        session.unsubscribe(CharacteristicId::Battery),
    )
    .await;
    assert!(result.is_err());
    assert!(!session.is_subscribed(CharacteristicId::Battery));

    mock.notify(CharacteristicId::Battery, vec![5, 0]);
    session.reset_heading().await.unwrap();
    assert!(levels.lock().unwrap().is_empty());

    mock.resume(Op::Unsubscribe);
    mock.clear_calls();
    session.close().await;
    assert_eq!(
        mock.calls(),
        vec![Call::Unsubscribe(CharacteristicId::Battery), Call::Disconnect]
    );
}

#[tokio::test]
async fn pump_dispatches_until_the_link_is_lost() {
    let mock = MockTransport::new();
    let mut session = open_session(&mock).await;
    let (levels, consumer) = battery_log();
    session.subscribe(consumer).await.unwrap();

    let (reason, ()) = tokio::join!(session.pump(), async {
        for level in [1, 2, 3] {
            tokio::time::sleep(Duration::from_millis(5)).await;
            mock.notify(CharacteristicId::Battery, vec![level, 0]);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        mock.drop_link();
    });

    assert_eq!(reason.kind(), ErrorKind::UnexpectedDisconnect);
    assert_eq!(*levels.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn close_unsubscribes_best_effort() {
    let mock = MockTransport::new();
    let mut session = open_session(&mock).await;
    let (_, consumer) = battery_log();
    session.subscribe(consumer).await.unwrap();
    session
        .subscribe(|_: DeviceReport| {})
        .await
        .unwrap();
    mock.fail_unsubscribe();
    mock.clear_calls();

    session.close().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(
        mock.calls(),
        vec![
            Call::Unsubscribe(CharacteristicId::DeviceReport),
            Call::Unsubscribe(CharacteristicId::Battery),
            Call::Disconnect,
        ]
    );
}

#[tokio::test]
async fn scoped_session_closes_on_error() {
    init_tracing();
    let mock = MockTransport::new();
    let result: xsens_dot_async::Result<()> = Session::new(mock.clone(), ADDRESS)
        .scoped(async |session| {
            session.battery().await?;
            session.set_output_rate(7).await
        })
        .await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(mock.calls().last(), Some(&Call::Disconnect));
}

#[tokio::test]
async fn dropping_an_open_session_releases_the_link() {
    let mock = MockTransport::new();
    let session = open_session(&mock).await;
    drop(session);
    assert_eq!(mock.calls(), vec![Call::Disconnect]);
}
