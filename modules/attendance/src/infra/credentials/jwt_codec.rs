use std::time::Duration;

use jsonwebtoken::{
    decode, encode, get_current_timestamp, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{Deserialize, Serialize};

use crate::domain::ports::{TokenCodec, TokenError};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    iat: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<u64>,
}

/// HS256 bearer tokens. Without a TTL, tokens carry no `exp` and never expire.
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Option<Duration>,
}

impl JwtCodec {
    pub fn new(secret: &[u8], ttl: Option<Duration>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        if ttl.is_some() {
            validation.required_spec_claims.insert("exp".to_string());
        }
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }
}

impl TokenCodec for JwtCodec {
    fn issue(&self, subject: &str) -> anyhow::Result<String> {
        let now = get_current_timestamp();
        let claims = Claims {
            sub: Some(subject.to_owned()),
            iat: now,
            exp: self.ttl.map(|ttl| now + ttl.as_secs()),
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    fn parse(&self, token: &str) -> Result<String, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;
        data.claims
            .sub
            .filter(|s| !s.is_empty())
            .ok_or(TokenError::MissingSubject)
    }
}
