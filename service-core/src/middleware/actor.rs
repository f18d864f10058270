use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

pub const USER_ID_HEADER: &str = "X-User-ID";

/// Operator performing a request.
///
/// The identity is asserted by the upstream auth layer through the `X-User-ID`
/// header and is only used to attribute audit rows. Requests without the
/// header are attributed to `system` (batch imports, internal jobs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    pub fn system() -> Self {
        Actor("system".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Actor(s.to_string()))
            .unwrap_or_else(Actor::system);

        tracing::Span::current().record("user_id", actor.as_str());

        Ok(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Actor {
        let (mut parts, _) = request.into_parts();
        Actor::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn reads_user_header() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "ops-7")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await, Actor("ops-7".to_string()));
    }

    #[tokio::test]
    async fn defaults_to_system() {
        let request = Request::builder().body(()).unwrap();
        assert_eq!(extract(request).await, Actor::system());
    }
}
