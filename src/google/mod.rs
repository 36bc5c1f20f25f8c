//! Google Sign-In and Play Games services.
//!
//! The native side is reached through a [`GooglePlatform`]. Sign-in and leaderboard
//! queries each go through their own single-flight slot because the native SDKs keep
//! a single pending callback per operation.

pub mod models;

pub use models::{CredentialProvider, GoogleCredential, PlatformKind, SignInRequest};

use crate::config::FirebaseConfig;
use crate::core::bridge::{AsyncBridge, NativeCompletion};
use crate::core::single_flight::SingleFlight;
use crate::core::{category, Error, ErrorCode, Outcome};
use std::sync::Arc;

const SIGN_IN_BUSY: &str = "previous sign in attempt not finished";
const QUERY_BUSY: &str = "previous query not finished";
const ANDROID_OR_IOS_EXPECTED: &str = "invalid platform, Android or IOS expected";
const ANDROID_EXPECTED: &str = "invalid platform, Android expected";
const PLAY_GAMES_UNAVAILABLE: &str = "Google Play Games sign-in is unavailable on this platform.";
const IOS_SIGN_IN_DISABLED: &str = "Google Sign-In is disabled by default on iOS. You can turn it on in the settings. \
     Make sure to add your custom URL scheme or the application will crash.";
const EMPTY_ID_TOKEN: &str = "IdToken was empty. Make sure you specified a correct ServerClientID.";

/// The native Google SDK of the running platform.
///
/// Completions may be resolved from any thread.
pub trait GooglePlatform: Send + Sync {
    fn kind(&self) -> PlatformKind;

    fn sign_in(&self, request: &SignInRequest, completion: NativeCompletion<()>);
    fn sign_out(&self);
    fn is_signed_in(&self) -> bool;
    fn id_token(&self) -> String;
    fn access_token(&self) -> String;

    fn get_leaderboard_score(&self, leaderboard_id: &str, completion: NativeCompletion<i64>);
    fn submit_score(&self, leaderboard_id: &str, score: i64);
    fn show_leaderboard(&self, leaderboard_id: &str);
    fn show_achievements(&self);
}

/// A host without Google services. Every call is rejected before reaching it.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedPlatform;

impl GooglePlatform for UnsupportedPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Unsupported
    }

    fn sign_in(&self, _request: &SignInRequest, completion: NativeCompletion<()>) {
        completion.fail(Error::UnavailablePlatform(ANDROID_OR_IOS_EXPECTED.to_string()));
    }

    fn sign_out(&self) {}

    fn is_signed_in(&self) -> bool {
        false
    }

    fn id_token(&self) -> String {
        String::new()
    }

    fn access_token(&self) -> String {
        String::new()
    }

    fn get_leaderboard_score(&self, _leaderboard_id: &str, completion: NativeCompletion<i64>) {
        completion.fail(Error::UnavailablePlatform(ANDROID_EXPECTED.to_string()));
    }

    fn submit_score(&self, _leaderboard_id: &str, _score: i64) {}

    fn show_leaderboard(&self, _leaderboard_id: &str) {}

    fn show_achievements(&self) {}
}

pub struct GoogleServices {
    platform: Arc<dyn GooglePlatform>,
    bridge: AsyncBridge,
    ios_sign_in_enabled: bool,
    play_games_enabled: bool,
    sign_in_slot: Arc<SingleFlight<()>>,
    leaderboard_slot: Arc<SingleFlight<i64>>,
}

impl GoogleServices {
    pub fn new(config: &FirebaseConfig, platform: Arc<dyn GooglePlatform>, bridge: AsyncBridge) -> Self {
        Self {
            platform,
            bridge,
            ios_sign_in_enabled: config.enable_google_sign_in,
            play_games_enabled: config.enable_google_play_games_sign_in,
            sign_in_slot: SingleFlight::new("google.sign_in", SIGN_IN_BUSY),
            leaderboard_slot: SingleFlight::new("google.leaderboard_score", QUERY_BUSY),
        }
    }

    pub fn platform_kind(&self) -> PlatformKind {
        self.platform.kind()
    }

    /// Signs the user in. Rejections that need no native call are delivered before
    /// this returns; everything else arrives on the main context.
    pub fn sign_in<F>(&self, request: SignInRequest, on_complete: F)
    where
        F: FnOnce(Outcome<()>) + Send + 'static,
    {
        let kind = self.platform.kind();
        let rejection = match kind {
            PlatformKind::Unsupported => Some(ANDROID_OR_IOS_EXPECTED),
            PlatformKind::Ios if !self.ios_sign_in_enabled => Some(IOS_SIGN_IN_DISABLED),
            PlatformKind::Ios if request.use_play_games => Some(PLAY_GAMES_UNAVAILABLE),
            PlatformKind::Android if request.use_play_games && !self.play_games_enabled => {
                Some(PLAY_GAMES_UNAVAILABLE)
            }
            _ => None,
        };
        if let Some(message) = rejection {
            on_complete(Outcome::failure(Error::UnavailablePlatform(message.to_string())));
            return;
        }

        if request.skip_if_signed && self.platform.is_signed_in() {
            tracing::info!(target: category::GOOGLE_SERVICES, "User is already signed.");
            on_complete(Outcome::success(()));
            return;
        }

        if request.server_client_id.is_empty() {
            tracing::warn!(
                target: category::GOOGLE_SERVICES,
                "ServerClientID is empty, ID token won't be requested."
            );
        }

        tracing::info!(target: category::GOOGLE_SERVICES, platform = ?kind, "Signing in with Google.");

        let platform = Arc::clone(&self.platform);
        self.sign_in_slot.try_issue(
            &self.bridge,
            move |completion| platform.sign_in(&request, completion),
            move |outcome: Outcome<()>| {
                match &outcome.error {
                    None => tracing::info!(target: category::GOOGLE_SERVICES, "Signed in."),
                    Some(error) => tracing::error!(
                        target: category::GOOGLE_SERVICES,
                        "Failed to sign in: {}",
                        error.message()
                    ),
                }
                on_complete(outcome);
            },
        );
    }

    /// Signs in, then packs the resulting tokens into a credential.
    ///
    /// Already signed-in users are reused.
    pub fn get_credential<F>(&self, request: SignInRequest, on_complete: F)
    where
        F: FnOnce(Outcome<GoogleCredential>) + Send + 'static,
    {
        let request = request.skip_if_signed(true);
        let provider = if request.use_play_games {
            CredentialProvider::PlayGames
        } else {
            CredentialProvider::Google
        };

        let platform = Arc::clone(&self.platform);
        self.sign_in(request, move |outcome| {
            if let Some(error) = outcome.error {
                on_complete(Outcome::failure(error));
                return;
            }

            let token = platform.id_token();
            if token.is_empty() {
                on_complete(Outcome::failure(Error::native(
                    ErrorCode::FailedPrecondition,
                    EMPTY_ID_TOKEN,
                )));
                return;
            }

            let access_token = match provider {
                CredentialProvider::Google => platform.access_token(),
                CredentialProvider::PlayGames => String::new(),
            };
            tracing::info!(target: category::GOOGLE_SERVICES, ?provider, "Created Google credential.");
            on_complete(Outcome::success(GoogleCredential {
                provider,
                token,
                access_token,
            }));
        });
    }

    pub fn sign_out(&self) {
        self.platform.sign_out();
    }

    pub fn is_signed_in(&self) -> bool {
        self.platform.is_signed_in()
    }

    /// Empty when nobody is signed in or no server client id was given.
    pub fn id_token(&self) -> String {
        self.platform.id_token()
    }

    pub fn access_token(&self) -> String {
        self.platform.access_token()
    }

    /// Queries the signed-in player's score. Android only.
    pub fn get_leaderboard_score<F>(&self, leaderboard_id: &str, on_complete: F)
    where
        F: FnOnce(Outcome<i64>) + Send + 'static,
    {
        if self.platform.kind() != PlatformKind::Android {
            tracing::error!(
                target: category::GOOGLE_SERVICES,
                "Leaderboard can only be queried on Android."
            );
            on_complete(Outcome::failure(Error::UnavailablePlatform(
                ANDROID_EXPECTED.to_string(),
            )));
            return;
        }

        let platform = Arc::clone(&self.platform);
        let leaderboard_id = leaderboard_id.to_string();
        self.leaderboard_slot.try_issue(
            &self.bridge,
            move |completion| platform.get_leaderboard_score(&leaderboard_id, completion),
            move |outcome: Outcome<i64>| {
                match &outcome.error {
                    None => tracing::info!(target: category::GOOGLE_SERVICES, "Leaderboard queried."),
                    Some(error) => tracing::error!(
                        target: category::GOOGLE_SERVICES,
                        "Failed to query leaderboard: {}",
                        error.message()
                    ),
                }
                on_complete(outcome);
            },
        );
    }

    pub fn submit_score(&self, leaderboard_id: &str, score: i64) -> Result<(), Error> {
        self.require_android("Leaderboard can only be written on Android.")?;
        self.platform.submit_score(leaderboard_id, score);
        Ok(())
    }

    pub fn show_leaderboard(&self, leaderboard_id: &str) -> Result<(), Error> {
        self.require_android("Leaderboard can only be shown on Android.")?;
        self.platform.show_leaderboard(leaderboard_id);
        Ok(())
    }

    pub fn show_achievements(&self) -> Result<(), Error> {
        self.require_android("Achievements can only be shown on Android.")?;
        self.platform.show_achievements();
        Ok(())
    }

    fn require_android(&self, log_message: &str) -> Result<(), Error> {
        if self.platform.kind() == PlatformKind::Android {
            return Ok(());
        }
        tracing::error!(target: category::GOOGLE_SERVICES, "{}", log_message);
        Err(Error::UnavailablePlatform(ANDROID_EXPECTED.to_string()))
    }
}

#[cfg(test)]
mod tests;
