/// The platform the host is running on, as far as Google services care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlatformKind {
    Android,
    Ios,
    #[default]
    Unsupported,
}

/// Parameters for a Google sign-in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInRequest {
    /// OAuth client id of the backend. Without it no ID token is requested.
    pub server_client_id: String,
    /// Complete right away when a user is already signed in.
    pub skip_if_signed: bool,
    /// Try to restore the previous session before showing any UI.
    pub use_silent_sign_in: bool,
    /// Sign in through Google Play Games (Android only).
    pub use_play_games: bool,
}

impl SignInRequest {
    pub fn new(server_client_id: impl Into<String>) -> Self {
        Self {
            server_client_id: server_client_id.into(),
            ..Self::default()
        }
    }

    pub fn skip_if_signed(mut self, skip: bool) -> Self {
        self.skip_if_signed = skip;
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.use_silent_sign_in = silent;
        self
    }

    pub fn play_games(mut self, play_games: bool) -> Self {
        self.use_play_games = play_games;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialProvider {
    #[default]
    Google,
    /// `token` holds the Play Games server auth code.
    PlayGames,
}

/// Tokens to exchange for a Firebase Auth credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoogleCredential {
    pub provider: CredentialProvider,
    pub token: String,
    pub access_token: String,
}
