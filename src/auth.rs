use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use derive_new::new;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Validation};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};

use crate::model::AccountId;

/// A signed-in caller as vouched for by the session issuer.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Identity {
    pub account_id: AccountId,
    pub superuser: bool,
}

/// Claims carried by the bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct Claims {
    /// expiry, seconds since the epoch
    pub exp: i64,
    /// account id
    pub sub: AccountId,
    #[serde(default)]
    pub superuser: bool,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity::new(claims.sub, claims.superuser)
    }
}

#[derive(Debug, Snafu)]
pub enum AuthError {
    #[snafu(display("request is not authenticated"))]
    MissingToken {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("malformed authorization header"))]
    MalformedHeader {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to decode JWT token"))]
    Decode {
        source: jsonwebtoken::errors::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to encode JWT token"))]
    Encode {
        source: jsonwebtoken::errors::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Verifies bearer tokens issued by the session service (HS256 with a shared secret).
#[derive(Debug, Clone)]
pub struct Authenticator {
    secret: SecretString,
    algorithm: Algorithm,
    validation: Validation,
}

impl Authenticator {
    pub fn new(secret: SecretString) -> Self {
        let algorithm = Algorithm::HS256;

        Self {
            secret,
            algorithm,
            validation: Validation::new(algorithm),
        }
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.secret.expose_secret().as_bytes())
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.secret.expose_secret().as_bytes())
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode(token, &self.decoding_key(), &self.validation)
            .map(|data| data.claims)
            .context(DecodeSnafu)
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        let header = jsonwebtoken::Header::new(self.algorithm);
        jsonwebtoken::encode(&header, claims, &self.encoding_key()).context(EncodeSnafu)
    }

    /// Mints a week-long token. The session service normally does this; kept for tooling and tests.
    pub fn issue(&self, account_id: AccountId, superuser: bool) -> Result<String, AuthError> {
        let exp = (Utc::now() + Duration::days(7)).timestamp();
        self.encode(&Claims::new(exp, account_id, superuser))
    }

    /// The identity behind the request's bearer token, `None` when no token was sent.
    pub fn identify(&self, headers: &HeaderMap) -> Result<Option<Identity>, AuthError> {
        let Some(header) = headers.get(header::AUTHORIZATION) else {
            return Ok(None);
        };

        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .context(MalformedHeaderSnafu)?;

        self.decode(token).map(|claims| Some(claims.into()))
    }

    /// Like [Authenticator::identify] but an identity is required.
    pub fn require(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        self.identify(headers)?.context(MissingTokenSnafu)
    }
}
