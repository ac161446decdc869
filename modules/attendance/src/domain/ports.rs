use thiserror::Error;

/// One-way salted password hashing.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> anyhow::Result<String>;

    /// False on mismatch and on unparsable hashes.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token carries no subject")]
    MissingSubject,
}

/// Signed bearer tokens carrying a subject (user id).
pub trait TokenCodec: Send + Sync {
    fn issue(&self, subject: &str) -> anyhow::Result<String>;

    fn parse(&self, token: &str) -> Result<String, TokenError>;
}
