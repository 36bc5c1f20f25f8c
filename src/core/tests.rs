use super::bridge::{AsyncBridge, NativeCompletion};
use super::delegate::MulticastDelegate;
use super::game_thread::GameThread;
use super::single_flight::SingleFlight;
use super::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(T) + Send + Clone + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |value| sink.lock().push(value))
}

#[test]
fn test_error_code_from_raw() {
    assert_eq!(ErrorCode::from_raw(0), ErrorCode::None);
    assert_eq!(ErrorCode::from_raw(3), ErrorCode::InvalidArgument);
    assert_eq!(ErrorCode::from_raw(16), ErrorCode::Unauthenticated);
    assert_eq!(ErrorCode::from_raw(17), ErrorCode::Unknown);
    assert_eq!(ErrorCode::from_raw(-1), ErrorCode::Unknown);
    assert_eq!(ErrorCode::PermissionDenied.as_raw(), 7);
}

#[test]
fn test_error_code_from_status_and_http() {
    assert_eq!(ErrorCode::from_status("NOT_FOUND"), ErrorCode::NotFound);
    assert_eq!(ErrorCode::from_status("bogus"), ErrorCode::Unknown);
    assert_eq!(ErrorCode::from_http_status(200), ErrorCode::None);
    assert_eq!(ErrorCode::from_http_status(401), ErrorCode::Unauthenticated);
    assert_eq!(ErrorCode::from_http_status(504), ErrorCode::DeadlineExceeded);
    assert_eq!(ErrorCode::from_http_status(418), ErrorCode::Unknown);
}

#[test]
fn test_outcome_from_native_discards_payload_on_error() {
    let ok: Outcome<i32> = Outcome::from_native(0, "", Some(42));
    assert!(ok.is_success());
    assert_eq!(ok.payload, 42);

    let failed: Outcome<i32> = Outcome::from_native(14, "offline", Some(42));
    assert!(!failed.is_success());
    assert_eq!(failed.payload, 0);
    assert_eq!(failed.message(), "offline");
    assert_eq!(failed.error.as_ref().map(Error::code), Some(ErrorCode::Unavailable));
}

#[tokio::test]
async fn test_bridge_delivers_on_game_thread_once() {
    let mut game_thread = GameThread::try_current().unwrap();
    let bridge = AsyncBridge::new(game_thread.handle());
    let (seen, record) = recorder::<Outcome<String>>();

    let mut native: Option<NativeCompletion<String>> = None;
    bridge.issue("test", |completion| native = Some(completion), record);

    let completion = native.unwrap();
    let second = completion.clone();
    let worker = std::thread::spawn(move || completion.succeed("token".to_string()));
    assert!(worker.join().unwrap());
    assert!(!second.succeed("again".to_string()));
    assert!(!second.fail(Error::native(ErrorCode::Internal, "late")));

    // Nothing runs until the main context is pumped.
    assert!(seen.lock().is_empty());
    assert_eq!(game_thread.pump(), 1);

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].payload, "token");
}

#[tokio::test]
async fn test_bridge_dropped_completion_reports_cancelled() {
    let mut game_thread = GameThread::try_current().unwrap();
    let bridge = AsyncBridge::new(game_thread.handle());
    let (seen, record) = recorder::<Outcome<u32>>();

    bridge.issue("test", |completion: NativeCompletion<u32>| drop(completion), record);
    game_thread.pump();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].error.as_ref().map(Error::code), Some(ErrorCode::Cancelled));
}

#[tokio::test]
async fn test_bridge_future() {
    let mut game_thread = GameThread::try_current().unwrap();
    let bridge = AsyncBridge::new(game_thread.handle());
    let (seen, record) = recorder::<Outcome<u32>>();

    bridge.issue_future("test", async { Ok(7) }, record.clone());
    bridge.issue_future(
        "test",
        async { Err(Error::native(ErrorCode::NotFound, "missing")) },
        record,
    );

    while seen.lock().len() < 2 {
        tokio::time::timeout(Duration::from_secs(5), game_thread.tick())
            .await
            .unwrap();
    }

    let seen = seen.lock();
    assert!(seen.iter().any(|o| o.is_success() && o.payload == 7));
    assert!(seen
        .iter()
        .any(|o| !o.is_success() && o.payload == 0 && o.message() == "missing"));
}

#[tokio::test]
async fn test_single_flight_rejects_second_issue_while_busy() {
    let mut game_thread = GameThread::try_current().unwrap();
    let bridge = AsyncBridge::new(game_thread.handle());
    let slot = SingleFlight::<()>::new("sign-in", "previous sign in attempt not finished");
    let native_calls = Arc::new(AtomicUsize::new(0));

    let (first_seen, first) = recorder::<Outcome<()>>();
    let (second_seen, second) = recorder::<Outcome<()>>();

    let mut pending = None;
    let calls = Arc::clone(&native_calls);
    assert!(slot.try_issue(
        &bridge,
        |completion| {
            calls.fetch_add(1, Ordering::SeqCst);
            pending = Some(completion);
        },
        first,
    ));
    assert!(slot.is_busy());

    let calls = Arc::clone(&native_calls);
    assert!(!slot.try_issue(
        &bridge,
        |_completion| {
            calls.fetch_add(1, Ordering::SeqCst);
        },
        second,
    ));

    // The rejection is synchronous and never reaches the native layer.
    assert_eq!(native_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        second_seen.lock()[0].error,
        Some(Error::Busy("previous sign in attempt not finished".to_string()))
    );

    pending.unwrap().succeed(());
    assert!(slot.is_busy());
    game_thread.pump();
    assert!(!slot.is_busy());
    assert!(first_seen.lock()[0].is_success());
}

#[tokio::test]
async fn test_single_flight_continuation_can_reissue() {
    let mut game_thread = GameThread::try_current().unwrap();
    let bridge = AsyncBridge::new(game_thread.handle());
    let slot = SingleFlight::<i32>::new("leaderboard", "previous query not finished");
    let (seen, record) = recorder::<bool>();

    let again = Arc::clone(&slot);
    let bridge_again = bridge.clone();
    slot.try_issue(
        &bridge,
        |completion| {
            completion.succeed(1);
        },
        move |_outcome| {
            let issued = again.try_issue(&bridge_again, |c| {
                c.succeed(2);
            }, |_| {});
            record(issued);
        },
    );

    game_thread.pump();
    assert_eq!(*seen.lock(), vec![true]);
}

#[test]
fn test_multicast_delegate() {
    let delegate = MulticastDelegate::<bool>::new();
    let count = Arc::new(AtomicUsize::new(0));

    let c = Arc::clone(&count);
    let first = delegate.add(move |sent| {
        if *sent {
            c.fetch_add(1, Ordering::SeqCst);
        }
    });
    let c = Arc::clone(&count);
    delegate.add(move |_| {
        c.fetch_add(10, Ordering::SeqCst);
    });

    delegate.broadcast(&true);
    assert_eq!(count.load(Ordering::SeqCst), 11);

    assert!(delegate.remove(first));
    assert!(!delegate.remove(first));
    delegate.broadcast(&true);
    assert_eq!(count.load(Ordering::SeqCst), 21);
}

#[tokio::test(start_paused = true)]
async fn test_timer_repeats_until_cleared() {
    let mut game_thread = GameThread::try_current().unwrap();
    let fired = Arc::new(AtomicUsize::new(0));

    let f = Arc::clone(&fired);
    let mut timer = game_thread.handle().set_timer(
        Duration::from_millis(500),
        true,
        None,
        move || {
            f.fetch_add(1, Ordering::SeqCst);
        },
    );

    for _ in 0..3 {
        game_thread.tick().await;
    }
    assert_eq!(fired.load(Ordering::SeqCst), 3);
    assert!(timer.is_active());

    timer.clear();
    assert!(!timer.is_active());
    tokio::time::sleep(Duration::from_secs(2)).await;
    game_thread.pump();
    assert_eq!(fired.load(Ordering::SeqCst), 3);
}

#[test]
fn test_error_body_with_ok_status_is_not_success() {
    let body: FirebaseErrorResponse = serde_json::from_value(serde_json::json!({
        "error": { "message": "odd backend", "status": "OK" }
    }))
    .unwrap();
    assert_eq!(body.error_code(500), ErrorCode::Internal);
    assert_eq!(body.error_code(200), ErrorCode::Unknown);

    let body: FirebaseErrorResponse = serde_json::from_value(serde_json::json!({
        "error": { "code": 200, "message": "odd backend" }
    }))
    .unwrap();
    assert_eq!(body.error_code(503), ErrorCode::Unavailable);
}

#[tokio::test]
async fn test_single_flight_released_when_game_thread_is_gone() {
    let game_thread = GameThread::try_current().unwrap();
    let bridge = AsyncBridge::new(game_thread.handle());
    let slot = SingleFlight::<()>::new("sign-in", "previous sign in attempt not finished");
    drop(game_thread);

    let (seen, record) = recorder::<Outcome<()>>();
    let mut pending = None;
    assert!(slot.try_issue(&bridge, |completion| pending = Some(completion), record));
    assert!(slot.is_busy());

    pending.unwrap().succeed(());
    assert!(!slot.is_busy());
    assert!(seen.lock().is_empty());

    // A dropped completion releases the slot too.
    let (_seen, record) = recorder::<Outcome<()>>();
    assert!(slot.try_issue(&bridge, drop, record));
    assert!(!slot.is_busy());
}

#[derive(Clone, Default)]
struct TargetRecorder {
    targets: Arc<Mutex<Vec<String>>>,
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for TargetRecorder {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        self.targets.lock().push(event.metadata().target().to_string());
    }
}

#[tokio::test]
async fn test_plumbing_logs_under_core_category() {
    use tracing_subscriber::layer::SubscriberExt;

    let recorder_layer = TargetRecorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder_layer.clone());
    let _default = tracing::subscriber::set_default(subscriber);

    let game_thread = GameThread::try_current().unwrap();
    let bridge = AsyncBridge::new(game_thread.handle());
    let slot = SingleFlight::<()>::new("sign-in", "previous sign in attempt not finished");

    let mut pending = None;
    slot.try_issue(&bridge, |completion| pending = Some(completion), |_| {});
    slot.try_issue(&bridge, |_| {}, |_| {});
    drop(pending);

    let targets = recorder_layer.targets.lock();
    assert!(!targets.is_empty());
    assert!(targets.iter().all(|target| target == category::CORE));
}
