//! Request extractors shared by all handlers. Every rejection renders as
//! `{"error": "<code>"}` through [`AppError`].

use crate::{errors::AppError, services::Owner, state::AppState};
use axum::{
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
};
use std::convert::Infallible;

/// `axum::Json` whose rejection renders as `{"error":"bad_request"}`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `axum::extract::Path` whose rejection renders as `{"error":"bad_path"}`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// `axum::extract::Query` whose rejection renders as `{"error":"bad_request"}`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Raw query pairs, in request order. A repeated key never rejects the
/// request; lookups see its first value.
#[derive(Debug, Default)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AppQuery(pairs) =
            AppQuery::<Vec<(String, String)>>::from_request_parts(parts, state).await?;
        Ok(Self(pairs))
    }
}

impl FromRequestParts<AppState> for Owner {
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(state.local_owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_of_a_repeated_key_wins() {
        let params = QueryParams(vec![
            ("limit".into(), "5".into()),
            ("cursor".into(), "abc".into()),
            ("limit".into(), "6".into()),
        ]);
        assert_eq!(params.get("limit"), Some("5"));
        assert_eq!(params.get("cursor"), Some("abc"));
        assert_eq!(params.get("ttl"), None);
    }
}
