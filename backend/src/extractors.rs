use std::convert::Infallible;

use axum::{
    body::Bytes,
    extract::{FromRef, FromRequest, FromRequestParts, OriginalUri, Path, Request},
    http::{header, request::Parts},
};
use serde_json::{Map, Value};
use sqlx::SqlitePool;

use crate::auth::{self, Credentials};
use crate::config::AppConfig;
use crate::db;
use crate::error::AppError;
use crate::models::User;

/// The requester, resolved from the bearer token.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    User(User),
}

impl Identity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::User(user) => Some(user),
            Identity::Anonymous => None,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user().map(|u| u.id)
    }

    /// The authenticated user, for code paths already gated by a policy.
    pub fn require(&self) -> Result<&User, AppError> {
        self.user().ok_or(AppError::NotAuthenticated)
    }
}

impl<S> FromRequestParts<S> for Identity
where
    SqlitePool: FromRef<S>,
    AppConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(Identity::Anonymous);
        };
        let value = value
            .to_str()
            .map_err(|_| AppError::AuthenticationFailed(auth::TOKEN_NOT_VALID))?;

        let token = match auth::parse_authorization(value)? {
            Credentials::Absent => return Ok(Identity::Anonymous),
            Credentials::Bearer(token) => token,
        };

        let config = AppConfig::from_ref(state);
        let claims = auth::decode_access_token(token, &config.jwt)?;

        let pool = SqlitePool::from_ref(state);
        let user = db::find_user(&pool, claims.user_id)
            .await?
            .ok_or(AppError::AuthenticationFailed("User not found"))?;

        if !user.is_active {
            return Err(AppError::AuthenticationFailed("User is inactive"));
        }

        Ok(Identity::User(user))
    }
}

/// Path parameters; anything that fails to parse is reported as not found.
#[derive(axum::extract::FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct ResourcePath<T>(pub T);

/// Raw request body, parsed on demand so that permission checks run first.
pub struct Payload {
    content_type: Option<String>,
    body: Bytes,
}

impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .map(str::to_owned);

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        Ok(Payload { content_type, body })
    }
}

impl Payload {
    /// The body as JSON. An empty body reads as an empty object.
    pub fn json(&self) -> Result<Value, AppError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(Map::new()));
        }

        let media_type = self
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .unwrap_or_default();
        if media_type != "application/json" && !media_type.ends_with("+json") {
            return Err(AppError::UnsupportedMediaType(media_type.to_string()));
        }

        serde_json::from_slice(&self.body)
            .map_err(|e| AppError::BadRequest(format!("JSON parse error - {e}")))
    }
}

/// The absolute URL of the current request, used to build pagination links.
#[derive(Debug, Clone)]
pub struct RequestUrl {
    base: String,
    query: Vec<String>,
}

impl<S> FromRequestParts<S> for RequestUrl
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| parts.uri.clone());

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok());

        Ok(RequestUrl::new(host, uri.path(), uri.query()))
    }
}

fn query_key(pair: &str) -> &str {
    pair.split('=').next().unwrap_or_default()
}

impl RequestUrl {
    pub fn new(host: Option<&str>, path: &str, query: Option<&str>) -> Self {
        let base = match host {
            Some(host) => format!("http://{host}{path}"),
            None => path.to_string(),
        };
        let query = query
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(str::to_owned)
            .collect();
        Self { base, query }
    }

    fn render(&self, mut pairs: Vec<String>) -> String {
        if pairs.is_empty() {
            return self.base.clone();
        }
        pairs.sort_by(|a, b| query_key(a).cmp(query_key(b)));
        format!("{}?{}", self.base, pairs.join("&"))
    }

    /// This URL with `key` set to `value`, replacing any previous value.
    pub fn with_param(&self, key: &str, value: i64) -> String {
        let mut pairs: Vec<String> = self
            .query
            .iter()
            .filter(|pair| query_key(pair) != key)
            .cloned()
            .collect();
        pairs.push(format!("{key}={value}"));
        self.render(pairs)
    }

    pub fn without_param(&self, key: &str) -> String {
        let pairs = self
            .query
            .iter()
            .filter(|pair| query_key(pair) != key)
            .cloned()
            .collect();
        self.render(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_and_sorts_params() {
        let url = RequestUrl::new(Some("testserver"), "/api/v1/posts/", Some("offset=4&limit=2"));
        assert_eq!(
            url.with_param("offset", 6),
            "http://testserver/api/v1/posts/?limit=2&offset=6"
        );
        assert_eq!(
            url.without_param("offset"),
            "http://testserver/api/v1/posts/?limit=2"
        );
    }

    #[test]
    fn keeps_unrelated_params() {
        let url = RequestUrl::new(None, "/api/v1/follow/", Some("search=bob"));
        assert_eq!(url.with_param("page", 2), "/api/v1/follow/?page=2&search=bob");
        assert_eq!(url.without_param("page"), "/api/v1/follow/?search=bob");
    }

    #[test]
    fn empty_body_is_an_empty_object() {
        let payload = Payload {
            content_type: None,
            body: Bytes::new(),
        };
        assert_eq!(payload.json().unwrap(), Value::Object(Map::new()));
    }

    #[test]
    fn rejects_non_json_bodies() {
        let payload = Payload {
            content_type: Some("text/plain".into()),
            body: Bytes::from_static(b"text=hi"),
        };
        assert!(matches!(payload.json(), Err(AppError::UnsupportedMediaType(_))));

        let payload = Payload {
            content_type: Some("application/json; charset=utf-8".into()),
            body: Bytes::from_static(b"{oops"),
        };
        assert!(matches!(payload.json(), Err(AppError::BadRequest(_))));
    }
}
