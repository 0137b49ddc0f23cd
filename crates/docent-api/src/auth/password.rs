/// Secret hashing and verification using Argon2id
///
/// Implements salted one-way hashing following OWASP recommendations:
/// - Algorithm: Argon2id (memory-hard, resistant to GPU attacks)
/// - Memory: 64 MB
/// - Iterations: 3
/// - Parallelism: 4 threads
/// - Salt: 16 bytes random
/// - Output: 32 bytes hash
///
/// The cost parameters are tunable through `AuthConfig`; hashes carry their
/// own parameters, so raising the cost later keeps old hashes verifiable.
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use docent_core::AuthConfig;
use thiserror::Error;

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// Password hashing configuration
///
/// Increasing memory or iterations improves brute-force resistance but slows
/// down every login.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (threads, default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

impl From<&AuthConfig> for PasswordConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            memory_cost: config.argon2_memory_kib,
            time_cost: config.argon2_iterations,
            parallelism: config.argon2_parallelism,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    /// Create Argon2 parameters from this configuration
    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// Hash a password with the given configuration
///
/// # Returns
///
/// * `Ok(String)` - PHC string format hash (algorithm, parameters, salt and hash)
/// * `Err(PasswordError)` - If hashing fails
///
/// # Example
///
/// ```no_run
/// use docent_api::auth::password::{hash_password_with_config, PasswordConfig};
///
/// let hash = hash_password_with_config("secret1", &PasswordConfig::default()).unwrap();
/// // Output: $argon2id$v=19$m=65536,t=3,p=4$...
/// ```
pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = config.to_params()?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a plaintext password against a stored hash
///
/// # Returns
///
/// * `Ok(true)` - Password matches
/// * `Ok(false)` - Password does not match
/// * `Err(PasswordError)` - If the stored hash cannot be parsed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    // Parameters come from the PHC string, not from this instance
    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
    }
}

/// Hashes secrets with a fixed configuration
///
/// Holds a hash of a throwaway secret so an unknown email can be answered
/// after the same amount of work as a wrong secret.
#[derive(Debug, Clone)]
pub struct SecretHasher {
    config: PasswordConfig,
    dummy_hash: String,
}

impl SecretHasher {
    pub fn new(config: PasswordConfig) -> Result<Self, PasswordError> {
        let dummy_hash = hash_password_with_config("docent-timing-equalizer", &config)?;
        Ok(Self { config, dummy_hash })
    }

    pub fn hash(&self, secret: &str) -> Result<String, PasswordError> {
        hash_password_with_config(secret, &self.config)
    }

    pub fn verify(&self, secret: &str, hash: &str) -> Result<bool, PasswordError> {
        verify_password(secret, hash)
    }

    /// Spend one verification on the dummy hash; always "no match"
    pub fn verify_dummy(&self, secret: &str) {
        let _ = verify_password(secret, &self.dummy_hash);
    }
}
