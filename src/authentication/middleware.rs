use warp::{reject::Rejection, Filter};

use crate::constants::SESSION_COOKIE;
use crate::error::ApiError;

use super::jwt::{verify_jwt_session, SessionData};

/// Requires a valid session cookie; rejects with 401 otherwise.
pub fn with_session() -> impl Filter<Extract = (SessionData,), Error = Rejection> + Copy {
    warp::cookie::optional::<String>(SESSION_COOKIE).and_then(|cookie: Option<String>| async move {
        match cookie {
            Some(token) => match verify_jwt_session(token) {
                Ok(claims) => Ok(claims.into()),
                Err(e) => Err(Rejection::from(e)),
            },
            None => Err(Rejection::from(ApiError::unauthorized(
                "Authentication credentials were not provided",
            ))),
        }
    })
}

/// Extracts the session when present, passing None for anonymous requests.
pub fn with_possible_session(
) -> impl Filter<Extract = (Option<SessionData>,), Error = std::convert::Infallible> + Copy {
    warp::cookie::optional::<String>(SESSION_COOKIE).map(|cookie: Option<String>| {
        cookie
            .and_then(|token| verify_jwt_session(token).ok())
            .map(SessionData::from)
    })
}
