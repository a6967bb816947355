//! Credentials and bearer tokens.
//!
//! Passwords are stored as Argon2id hashes. A successful registration or login
//! yields an HS256 token carrying the user id; every other operation starts by
//! turning that token back into a [`Principal`].

use std::sync::LazyLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::Accounts;
use crate::error::{Error, Result};
use crate::models::{User, UserProfile};

pub const TOKEN_TTL_DAYS: i64 = 30;
pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("email pattern is valid"));

#[derive(Debug, Clone, Default)]
pub struct PasswordHasher;

impl PasswordHasher {
    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Internal(format!("Password hashing failed: {e}")))?;
        Ok(hash.to_string())
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| Error::Internal(format!("Invalid password hash format: {e}")))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Internal(format!("Password verification failed: {e}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("validation", &self.validation)
            .finish()
    }
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 5;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(&self, user_id: &str) -> Result<String> {
        let now = Utc::now();
        self.sign(&Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Token signing failed: {e}")))
    }

    pub fn decode(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Error::Unauthenticated("token has expired".into())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    Error::Unauthenticated("invalid token signature".into())
                }
                _ => Error::Unauthenticated(format!("token validation failed: {e}")),
            }
        })?;
        Ok(data.claims)
    }

    /// Absent, malformed, forged or expired tokens are all rejected.
    pub fn authenticate(&self, token: Option<&str>) -> Result<Principal> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Unauthenticated("no token".into()))?;
        let token = token.strip_prefix("Bearer ").unwrap_or(token);

        let claims = self.decode(token)?;
        Ok(Principal { user_id: claims.sub })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registration {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

pub struct Auth {
    hasher: PasswordHasher,
    tokens: TokenService,
}

impl Auth {
    pub fn new(secret: &str) -> Self {
        Self {
            hasher: PasswordHasher,
            tokens: TokenService::new(secret),
        }
    }

    pub fn authenticate(&self, token: Option<&str>) -> Result<Principal> {
        self.tokens.authenticate(token)
    }

    pub fn register<A: Accounts + ?Sized>(&self, accounts: &A, req: Registration) -> Result<Session> {
        let (username, email, password) = validate_registration(req)?;

        let hash = self.hasher.hash_password(&password)?;
        let user = User::new(&username, &email, hash);
        accounts.insert_user(&user)?;

        info!(user_id = %user.id, username = %user.username, "Registered user");
        Ok(Session {
            token: self.tokens.issue(&user.id)?,
            user: user.profile(),
        })
    }

    pub fn login<A: Accounts + ?Sized>(&self, accounts: &A, email: &str, password: &str) -> Result<Session> {
        let invalid = || Error::Unauthenticated("Invalid credentials".into());

        let user = accounts.find_user_by_email(email)?.ok_or_else(invalid)?;
        if !self.hasher.verify_password(password, &user.password_hash)? {
            debug!(user_id = %user.id, "Rejected login with wrong password");
            return Err(invalid());
        }

        Ok(Session {
            token: self.tokens.issue(&user.id)?,
            user: user.profile(),
        })
    }
}

fn validate_registration(req: Registration) -> Result<(String, String, String)> {
    let present = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    let (username, email, password) = match (present(req.username), present(req.email), req.password) {
        (Some(u), Some(e), Some(p)) if !p.is_empty() => (u, e, p),
        _ => return Err(Error::validation("Username, email and password are required")),
    };

    if !EMAIL_RE.is_match(&email) {
        return Err(Error::validation("Please enter a valid email"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    Ok((username, email, password))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup_db() -> Database {
        let db = Database::open(":memory:").unwrap();
        db.init().unwrap();
        db
    }

    fn registration(username: &str, email: &str, password: &str) -> Registration {
        Registration {
            username: Some(username.into()),
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    mod password_tests {
        use super::*;

        #[test]
        fn hash_and_verify() {
            let hasher = PasswordHasher;
            let hash = hasher.hash_password("hunter22").unwrap();
            assert_ne!(hash, "hunter22");
            assert!(hasher.verify_password("hunter22", &hash).unwrap());
            assert!(!hasher.verify_password("hunter23", &hash).unwrap());
        }

        #[test]
        fn garbage_hash_is_an_error() {
            assert!(PasswordHasher.verify_password("x", "not-a-hash").is_err());
        }
    }

    mod token_tests {
        use super::*;

        #[test]
        fn issued_token_authenticates() {
            let tokens = TokenService::new("secret");
            let token = tokens.issue("user-1").unwrap();
            let principal = tokens.authenticate(Some(&token)).unwrap();
            assert_eq!(principal.user_id, "user-1");

            let claims = tokens.decode(&token).unwrap();
            assert_eq!(claims.exp - claims.iat, TOKEN_TTL_DAYS * 24 * 60 * 60);
        }

        #[test]
        fn bearer_prefix_is_accepted() {
            let tokens = TokenService::new("secret");
            let token = tokens.issue("user-1").unwrap();
            let header = format!("Bearer {token}");
            assert!(tokens.authenticate(Some(&header)).is_ok());
        }

        #[test]
        fn missing_token_is_unauthenticated() {
            let tokens = TokenService::new("secret");
            assert!(matches!(tokens.authenticate(None), Err(Error::Unauthenticated(_))));
            assert!(matches!(tokens.authenticate(Some("  ")), Err(Error::Unauthenticated(_))));
        }

        #[test]
        fn foreign_signature_is_rejected() {
            let token = TokenService::new("other").issue("user-1").unwrap();
            let err = TokenService::new("secret").authenticate(Some(&token)).unwrap_err();
            assert_eq!(err.kind(), "unauthenticated");
        }

        #[test]
        fn expired_token_is_rejected() {
            let tokens = TokenService::new("secret");
            let past = Utc::now() - Duration::days(1);
            let token = tokens
                .sign(&Claims {
                    sub: "user-1".into(),
                    iat: (past - Duration::days(1)).timestamp(),
                    exp: past.timestamp(),
                })
                .unwrap();
            assert!(matches!(tokens.authenticate(Some(&token)), Err(Error::Unauthenticated(_))));
        }

        #[test]
        fn malformed_token_is_rejected() {
            let tokens = TokenService::new("secret");
            assert!(tokens.authenticate(Some("abc.def")).is_err());
        }
    }

    mod registration_tests {
        use super::*;

        #[test]
        fn register_then_login() {
            let db = setup_db();
            let auth = Auth::new("secret");

            let session = auth
                .register(&db, registration("ada", "ada@example.com", "hunter22"))
                .unwrap();
            assert_eq!(session.user.username, "ada");
            let principal = auth.authenticate(Some(&session.token)).unwrap();
            assert_eq!(principal.user_id, session.user.id);

            let again = auth.login(&db, "ada@example.com", "hunter22").unwrap();
            assert_eq!(again.user.id, session.user.id);
        }

        #[test]
        fn wrong_password_and_unknown_email_look_the_same() {
            let db = setup_db();
            let auth = Auth::new("secret");
            auth.register(&db, registration("ada", "ada@example.com", "hunter22"))
                .unwrap();

            let wrong = auth.login(&db, "ada@example.com", "nope-nope").unwrap_err();
            let unknown = auth.login(&db, "bob@example.com", "hunter22").unwrap_err();
            assert_eq!(wrong.to_string(), unknown.to_string());
            assert_eq!(wrong.kind(), "unauthenticated");
        }

        #[test]
        fn duplicate_registration_conflicts() {
            let db = setup_db();
            let auth = Auth::new("secret");
            auth.register(&db, registration("ada", "ada@example.com", "hunter22"))
                .unwrap();
            let err = auth
                .register(&db, registration("ada", "ada2@example.com", "hunter22"))
                .unwrap_err();
            assert_eq!(err.kind(), "conflict");
        }

        #[test]
        fn missing_fields_are_rejected() {
            let err = validate_registration(Registration {
                username: Some("ada".into()),
                email: None,
                password: Some("hunter22".into()),
            })
            .unwrap_err();
            assert_eq!(err.kind(), "validation");
        }

        #[test]
        fn invalid_email_is_rejected() {
            let err = validate_registration(registration("ada", "not-an-email", "hunter22")).unwrap_err();
            assert_eq!(err.to_string(), "Please enter a valid email");
        }

        #[test]
        fn short_password_is_rejected() {
            let err = validate_registration(registration("ada", "ada@example.com", "12345")).unwrap_err();
            assert_eq!(err.kind(), "validation");
            assert!(validate_registration(registration("ada", "ada@example.com", "123456")).is_ok());
        }
    }
}
