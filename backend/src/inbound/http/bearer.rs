//! Bearer-token extractor for protected endpoints.
//!
//! Wraps the `Authorization: Bearer <token>` handshake so handlers only
//! deal with verified [`Claims`].

use actix_web::http::header::AUTHORIZATION;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};

use crate::domain::auth::Claims;
use crate::domain::Error;
use crate::inbound::http::state::HttpState;

/// Verified claims of the calling user.
#[derive(Debug, Clone)]
pub struct BearerClaims(pub Claims);

impl FromRequest for BearerClaims {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract(req))
    }
}

fn extract(req: &HttpRequest) -> Result<BearerClaims, Error> {
    let state = req
        .app_data::<web::Data<HttpState>>()
        .ok_or_else(|| Error::internal("HTTP state is not configured"))?;
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::unauthorized("missing bearer token"))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::unauthorized("authorization header must use the Bearer scheme"))?;
    let claims = state.tokens.verify(token)?;
    Ok(BearerClaims(claims))
}
