//! Bearer-token verification. Tokens are minted by an external issuer that
//! shares the HS256 secret; this service only checks them.

use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::error::AppError;

pub const ACCESS: &str = "access";
pub const TOKEN_NOT_VALID: &str = "Given token not valid for any token type";
pub const MALFORMED_HEADER: &str =
    "Authorization header must contain two space-delimited values";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: String,
    pub user_id: i64,
    pub exp: usize, // Expiration time
    pub iat: usize, // Issued at
}

/// Outcome of reading the `Authorization` header.
#[derive(Debug, PartialEq, Eq)]
pub enum Credentials<'a> {
    /// No header, or a scheme this service does not handle.
    Absent,
    Bearer(&'a str),
}

pub fn parse_authorization(header: &str) -> Result<Credentials<'_>, AppError> {
    let parts: Vec<&str> = header.split_whitespace().collect();
    match parts.as_slice() {
        [] => Ok(Credentials::Absent),
        [scheme, ..] if *scheme != "Bearer" => Ok(Credentials::Absent),
        [_, token] => Ok(Credentials::Bearer(*token)),
        _ => Err(AppError::AuthenticationFailed(MALFORMED_HEADER)),
    }
}

pub fn decode_access_token(token: &str, config: &JwtConfig) -> Result<Claims, AppError> {
    let mut validation = Validation::default();
    validation.leeway = config.leeway;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        AppError::AuthenticationFailed(TOKEN_NOT_VALID)
    })?
    .claims;

    if claims.token_type != ACCESS {
        return Err(AppError::AuthenticationFailed(TOKEN_NOT_VALID));
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "s3cret".into(),
            leeway: 0,
        }
    }

    fn token(secret: &str, token_type: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            token_type: token_type.into(),
            user_id: 9,
            exp: (now + exp_offset) as usize,
            iat: now as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn header_parsing() {
        assert_eq!(parse_authorization("").unwrap(), Credentials::Absent);
        assert_eq!(parse_authorization("Basic abc").unwrap(), Credentials::Absent);
        assert_eq!(
            parse_authorization("Bearer abc").unwrap(),
            Credentials::Bearer("abc")
        );
        assert!(parse_authorization("Bearer").is_err());
        assert!(parse_authorization("Bearer a b").is_err());
    }

    #[test]
    fn accepts_valid_access_token() {
        let claims = decode_access_token(&token("s3cret", ACCESS, 60), &config()).unwrap();
        assert_eq!(claims.user_id, 9);
    }

    #[test]
    fn rejects_bad_tokens() {
        for bad in [
            token("other", ACCESS, 60),
            token("s3cret", "refresh", 60),
            token("s3cret", ACCESS, -120),
            "garbage".to_string(),
        ] {
            assert!(matches!(
                decode_access_token(&bad, &config()),
                Err(AppError::AuthenticationFailed(TOKEN_NOT_VALID))
            ));
        }
    }
}
