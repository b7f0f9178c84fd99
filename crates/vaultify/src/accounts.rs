//! User registration and login.
//!
//! A user's RSA private key never touches storage in the clear. It is
//! sealed with a key derived from the password (Argon2id, per-user salt)
//! and only reopened by a successful [`Accounts::login`].

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, info};
use vaultify_core::kdf::{self, KdfParams};
use vaultify_core::validation::require_non_empty;
use vaultify_core::{CryptoError, KeyPair, PrivateKey, User, UserId, ValidationError};
use vaultify_store::{MetadataStore, StoreError};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

/// An authenticated user holding their decrypted private key.
#[derive(Debug, Clone)]
pub struct Session {
    user: User,
    private_key: PrivateKey,
}

impl Session {
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    pub fn public_key_pem(&self) -> &str {
        &self.user.public_key_pem
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }
}

/// Key material produced for a new account.
struct Identity {
    password_hash: String,
    public_key_pem: String,
    private_key_encrypted: String,
    kdf_salt: String,
}

/// Creates accounts and opens sessions.
#[derive(Clone)]
pub struct Accounts {
    store: Arc<dyn MetadataStore>,
    kdf: KdfParams,
    rsa_bits: usize,
}

impl Accounts {
    pub fn new(store: Arc<dyn MetadataStore>, kdf: KdfParams, rsa_bits: usize) -> Self {
        Self {
            store,
            kdf,
            rsa_bits,
        }
    }

    /// Create a user with a fresh key pair.
    ///
    /// Key generation and hashing are CPU-bound and run on the blocking pool.
    pub async fn register(&self, username: &str, password: &str, now: i64) -> Result<User> {
        let username = username.trim();
        require_non_empty(username, "username")?;
        require_non_empty(password, "password")?;

        if self.store.get_user_by_username(username).await?.is_some() {
            return Err(ValidationError::UsernameTaken(username.to_owned()).into());
        }

        let secret = Zeroizing::new(password.as_bytes().to_vec());
        let (params, bits) = (self.kdf, self.rsa_bits);
        let identity =
            tokio::task::spawn_blocking(move || new_identity(&secret, bits, &params)).await??;

        let mut user = User {
            id: 0,
            username: username.to_owned(),
            password_hash: identity.password_hash,
            public_key_pem: identity.public_key_pem,
            private_key_encrypted: identity.private_key_encrypted,
            kdf_salt: identity.kdf_salt,
            created_at: now,
        };
        user.id = match self.store.insert_user(&user).await {
            Ok(id) => id,
            Err(StoreError::Conflict(_)) => {
                return Err(ValidationError::UsernameTaken(user.username).into())
            }
            Err(e) => return Err(e.into()),
        };

        info!(user_id = user.id, "user registered");
        Ok(user)
    }

    /// Check a password and unseal the user's private key.
    ///
    /// Unknown users and wrong passwords yield the same error.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let user = self
            .store
            .get_user_by_username(username.trim())
            .await?
            .ok_or(VaultError::Authentication)?;

        let secret = Zeroizing::new(password.as_bytes().to_vec());
        let params = self.kdf;
        let record = user.clone();
        let private_key =
            tokio::task::spawn_blocking(move || open_identity(&record, &secret, &params)).await??;

        debug!(user_id = user.id, "session opened");
        Ok(Session { user, private_key })
    }
}

fn new_identity(password: &[u8], bits: usize, params: &KdfParams) -> Result<Identity> {
    let keys = KeyPair::generate(bits)?;
    let password_hash = kdf::hash_password(password, params)?;

    let salt = kdf::generate_salt();
    let kek = kdf::derive_key(password, &salt, params)?;
    let sealed = kek.encrypt(&keys.private_key().to_der()?)?;

    Ok(Identity {
        password_hash,
        public_key_pem: keys.public_key().to_pem()?,
        private_key_encrypted: BASE64.encode(sealed),
        kdf_salt: BASE64.encode(salt),
    })
}

fn open_identity(user: &User, password: &[u8], params: &KdfParams) -> Result<PrivateKey> {
    if !kdf::verify_password(password, &user.password_hash).unwrap_or(false) {
        return Err(VaultError::Authentication);
    }

    let salt = BASE64
        .decode(&user.kdf_salt)
        .map_err(|e| CryptoError::Encoding(format!("kdf salt: {e}")))?;
    let sealed = BASE64
        .decode(&user.private_key_encrypted)
        .map_err(|e| CryptoError::Encoding(format!("sealed private key: {e}")))?;

    let kek = kdf::derive_key(password, &salt, params)?;
    let der = Zeroizing::new(kek.decrypt(&sealed)?);
    let private_key = PrivateKey::from_der(&der)?;

    if private_key.public_key().to_pem()? != user.public_key_pem {
        return Err(CryptoError::InvalidKey("private key does not match public key".into()).into());
    }
    Ok(private_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultify_core::PublicKey;
    use vaultify_store::MemoryStore;

    const BITS: usize = 1024;

    fn accounts() -> (Accounts, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let accounts = Accounts::new(store.clone(), KdfParams::insecure_fast(), BITS);
        (accounts, store)
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (accounts, store) = accounts();
        let user = accounts.register("alice", "correct horse", 7).await.unwrap();

        assert!(user.id > 0);
        assert_eq!(user.created_at, 7);
        assert!(user.password_hash.starts_with("$argon2id$"));
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap(), user);

        let session = accounts.login("alice", "correct horse").await.unwrap();
        assert_eq!(session.user_id(), user.id);

        // The unsealed key pairs with the stored public key.
        let public = PublicKey::from_pem(session.public_key_pem()).unwrap();
        let sig = session.private_key().sign(b"hello").unwrap();
        public.verify(b"hello", &sig).unwrap();
    }

    #[tokio::test]
    async fn test_private_key_not_stored_in_clear() {
        let (accounts, _) = accounts();
        let user = accounts.register("alice", "pw", 0).await.unwrap();
        let session = accounts.login("alice", "pw").await.unwrap();

        let der = session.private_key().to_der().unwrap();
        let sealed = BASE64.decode(&user.private_key_encrypted).unwrap();
        assert_ne!(sealed.len(), der.len());
        assert!(!sealed.windows(32).any(|w| w == &der[..32]));
    }

    #[tokio::test]
    async fn test_register_rejects_empty_and_duplicate() {
        let (accounts, _) = accounts();
        assert!(matches!(
            accounts.register("  ", "pw", 0).await,
            Err(VaultError::Validation(ValidationError::Empty("username")))
        ));
        assert!(matches!(
            accounts.register("bob", "", 0).await,
            Err(VaultError::Validation(ValidationError::Empty("password")))
        ));

        accounts.register("bob", "pw", 0).await.unwrap();
        assert!(matches!(
            accounts.register("bob", "other", 0).await,
            Err(VaultError::Validation(ValidationError::UsernameTaken(_)))
        ));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (accounts, _) = accounts();
        accounts.register("carol", "secret", 0).await.unwrap();

        let wrong_password = accounts.login("carol", "guess").await.unwrap_err();
        let unknown_user = accounts.login("mallory", "secret").await.unwrap_err();
        assert!(matches!(wrong_password, VaultError::Authentication));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }
}
