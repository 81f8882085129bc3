use meritx_core::{Credentials, MeritxError};
use meritx_storage::Db;
use meritx_token::TokenManager;

/// Registration and password verification over storage and the token
/// manager.
#[derive(Clone)]
pub struct AuthService {
    db: Db,
    tokens: TokenManager,
}

impl AuthService {
    pub fn new(db: Db, tokens: TokenManager) -> Self {
        Self { db, tokens }
    }

    /// Create an account and mint its first token. A taken login surfaces
    /// as [`MeritxError::UserAlreadyExists`].
    pub async fn register(&self, creds: &Credentials) -> Result<String, MeritxError> {
        let hash = bcrypt::hash(&creds.password, bcrypt::DEFAULT_COST)
            .map_err(|e| MeritxError::Internal(format!("hashing password: {e}")))?;
        let user_id = self.db.create_user(&creds.login, &hash).await?;
        self.tokens.mint(user_id)
    }

    /// Verify a login/password pair and mint a token. Absent users and
    /// wrong passwords are distinct variants here but indistinguishable at
    /// the boundary, which maps both to 401.
    pub async fn authenticate(&self, creds: &Credentials) -> Result<String, MeritxError> {
        let user = self.db.user_by_login(&creds.login).await?;
        let valid = bcrypt::verify(&creds.password, &user.password_hash)
            .map_err(|e| MeritxError::Internal(format!("verifying password: {e}")))?;
        if !valid {
            return Err(MeritxError::InvalidCredentials);
        }
        self.tokens.mint(user.id)
    }
}
