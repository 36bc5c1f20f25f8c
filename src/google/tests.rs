use super::*;
use crate::core::game_thread::GameThread;
use parking_lot::Mutex;

#[derive(Default)]
struct FakePlatform {
    kind: PlatformKind,
    signed_in: Mutex<bool>,
    id_token: Mutex<String>,
    sign_in_requests: Mutex<Vec<SignInRequest>>,
    pending_sign_in: Mutex<Option<NativeCompletion<()>>>,
    pending_score: Mutex<Option<NativeCompletion<i64>>>,
    submitted: Mutex<Vec<(String, i64)>>,
}

impl FakePlatform {
    fn new(kind: PlatformKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            ..Self::default()
        })
    }

    fn finish_sign_in(&self, token: &str) {
        *self.signed_in.lock() = true;
        *self.id_token.lock() = token.to_string();
        let completion = self.pending_sign_in.lock().take().unwrap();
        completion.succeed(());
    }
}

impl GooglePlatform for FakePlatform {
    fn kind(&self) -> PlatformKind {
        self.kind
    }

    fn sign_in(&self, request: &SignInRequest, completion: NativeCompletion<()>) {
        self.sign_in_requests.lock().push(request.clone());
        *self.pending_sign_in.lock() = Some(completion);
    }

    fn sign_out(&self) {
        *self.signed_in.lock() = false;
        self.id_token.lock().clear();
    }

    fn is_signed_in(&self) -> bool {
        *self.signed_in.lock()
    }

    fn id_token(&self) -> String {
        self.id_token.lock().clone()
    }

    fn access_token(&self) -> String {
        if self.is_signed_in() {
            "access".to_string()
        } else {
            String::new()
        }
    }

    fn get_leaderboard_score(&self, _leaderboard_id: &str, completion: NativeCompletion<i64>) {
        *self.pending_score.lock() = Some(completion);
    }

    fn submit_score(&self, leaderboard_id: &str, score: i64) {
        self.submitted.lock().push((leaderboard_id.to_string(), score));
    }

    fn show_leaderboard(&self, _leaderboard_id: &str) {}

    fn show_achievements(&self) {}
}

fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl FnOnce(T) + Send + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |value| sink.lock().push(value))
}

fn services(
    game_thread: &GameThread,
    config: &FirebaseConfig,
    platform: Arc<FakePlatform>,
) -> GoogleServices {
    GoogleServices::new(config, platform, AsyncBridge::new(game_thread.handle()))
}

#[tokio::test]
async fn test_sign_in_rejects_concurrent_attempt() {
    let mut game_thread = GameThread::try_current().unwrap();
    let platform = FakePlatform::new(PlatformKind::Android);
    let google = services(&game_thread, &FirebaseConfig::default(), platform.clone());

    let (first_seen, first) = recorder::<Outcome<()>>();
    let (second_seen, second) = recorder::<Outcome<()>>();
    google.sign_in(SignInRequest::new("server-id"), first);
    google.sign_in(SignInRequest::new("server-id"), second);

    assert_eq!(
        second_seen.lock()[0].error,
        Some(Error::Busy("previous sign in attempt not finished".to_string()))
    );
    assert_eq!(platform.sign_in_requests.lock().len(), 1);

    platform.finish_sign_in("id-token");
    game_thread.pump();
    assert!(first_seen.lock()[0].is_success());
    assert!(google.is_signed_in());

    // The slot is free again.
    let (third_seen, third) = recorder::<Outcome<()>>();
    google.sign_in(SignInRequest::new("server-id"), third);
    assert!(third_seen.lock().is_empty());
    assert_eq!(platform.sign_in_requests.lock().len(), 2);
}

#[tokio::test]
async fn test_sign_in_unsupported_platform() {
    let game_thread = GameThread::try_current().unwrap();
    let google = GoogleServices::new(
        &FirebaseConfig::default(),
        Arc::new(UnsupportedPlatform),
        AsyncBridge::new(game_thread.handle()),
    );

    let (seen, record) = recorder::<Outcome<()>>();
    google.sign_in(SignInRequest::default(), record);
    assert_eq!(
        seen.lock()[0].error,
        Some(Error::UnavailablePlatform(
            "invalid platform, Android or IOS expected".to_string()
        ))
    );
    assert_eq!(
        google.show_achievements(),
        Err(Error::UnavailablePlatform(
            "invalid platform, Android expected".to_string()
        ))
    );
}

#[tokio::test]
async fn test_ios_sign_in_requires_opt_in() {
    let game_thread = GameThread::try_current().unwrap();
    let platform = FakePlatform::new(PlatformKind::Ios);
    let google = services(&game_thread, &FirebaseConfig::default(), platform.clone());

    let (seen, record) = recorder::<Outcome<()>>();
    google.sign_in(SignInRequest::new("server-id"), record);
    assert!(matches!(
        seen.lock()[0].error,
        Some(Error::UnavailablePlatform(_))
    ));
    assert!(platform.sign_in_requests.lock().is_empty());

    let enabled = FirebaseConfig {
        enable_google_sign_in: true,
        ..FirebaseConfig::default()
    };
    let google = services(&game_thread, &enabled, platform.clone());
    let (seen, record) = recorder::<Outcome<()>>();
    google.sign_in(SignInRequest::new("server-id").play_games(true), record);
    assert_eq!(
        seen.lock()[0].error,
        Some(Error::UnavailablePlatform(
            "Google Play Games sign-in is unavailable on this platform.".to_string()
        ))
    );
}

#[tokio::test]
async fn test_skip_if_signed_completes_immediately() {
    let game_thread = GameThread::try_current().unwrap();
    let platform = FakePlatform::new(PlatformKind::Android);
    *platform.signed_in.lock() = true;
    let google = services(&game_thread, &FirebaseConfig::default(), platform.clone());

    let (seen, record) = recorder::<Outcome<()>>();
    google.sign_in(SignInRequest::new("server-id").skip_if_signed(true), record);
    assert!(seen.lock()[0].is_success());
    assert!(platform.sign_in_requests.lock().is_empty());
}

#[tokio::test]
async fn test_get_credential() {
    let mut game_thread = GameThread::try_current().unwrap();
    let platform = FakePlatform::new(PlatformKind::Android);
    let google = services(&game_thread, &FirebaseConfig::default(), platform.clone());

    let (seen, record) = recorder::<Outcome<GoogleCredential>>();
    google.get_credential(SignInRequest::new("server-id"), record);
    assert!(platform.sign_in_requests.lock()[0].skip_if_signed);

    platform.finish_sign_in("id-token");
    game_thread.pump();

    assert_eq!(
        seen.lock()[0].payload,
        GoogleCredential {
            provider: CredentialProvider::Google,
            token: "id-token".to_string(),
            access_token: "access".to_string(),
        }
    );
}

#[tokio::test]
async fn test_get_credential_with_empty_id_token_fails() {
    let mut game_thread = GameThread::try_current().unwrap();
    let platform = FakePlatform::new(PlatformKind::Android);
    let config = FirebaseConfig {
        enable_google_play_games_sign_in: true,
        ..FirebaseConfig::default()
    };
    let google = services(&game_thread, &config, platform.clone());

    let (seen, record) = recorder::<Outcome<GoogleCredential>>();
    google.get_credential(SignInRequest::new("").play_games(true), record);
    platform.finish_sign_in("");
    game_thread.pump();

    let seen = seen.lock();
    assert_eq!(seen[0].payload, GoogleCredential::default());
    assert_eq!(
        seen[0].message(),
        "IdToken was empty. Make sure you specified a correct ServerClientID."
    );
}

#[tokio::test]
async fn test_leaderboard_score() {
    let mut game_thread = GameThread::try_current().unwrap();
    let platform = FakePlatform::new(PlatformKind::Android);
    let google = services(&game_thread, &FirebaseConfig::default(), platform.clone());

    let (seen, record) = recorder::<Outcome<i64>>();
    let (busy_seen, busy) = recorder::<Outcome<i64>>();
    google.get_leaderboard_score("weekly", record);
    google.get_leaderboard_score("weekly", busy);
    assert_eq!(
        busy_seen.lock()[0].error,
        Some(Error::Busy("previous query not finished".to_string()))
    );

    let completion = platform.pending_score.lock().take().unwrap();
    completion.complete(0, "", Some(1200));
    game_thread.pump();
    assert_eq!(seen.lock()[0].payload, 1200);

    google.submit_score("weekly", 1300).unwrap();
    assert_eq!(*platform.submitted.lock(), vec![("weekly".to_string(), 1300)]);
}

#[tokio::test]
async fn test_leaderboard_score_off_android() {
    let game_thread = GameThread::try_current().unwrap();
    let google = services(
        &game_thread,
        &FirebaseConfig::default(),
        FakePlatform::new(PlatformKind::Ios),
    );

    let (seen, record) = recorder::<Outcome<i64>>();
    google.get_leaderboard_score("weekly", record);
    let seen = seen.lock();
    assert_eq!(seen[0].payload, 0);
    assert_eq!(seen[0].message(), "invalid platform, Android expected");
}
