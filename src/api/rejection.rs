use std::convert::Infallible;

use serde_json::json;
use warp::{http::StatusCode, Rejection, Reply};

use crate::error::ApiError;

/// Maps rejections to the JSON error body every endpoint shares.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, detail) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, String::from("Not found"))
    } else if let Some(e) = err.find::<ApiError>() {
        (e.status(), e.to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, String::from("Invalid query string"))
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            String::from("Method not allowed"),
        )
    } else {
        log::error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("Internal server error"),
        )
    };

    let body = warp::reply::json(&json!({ "detail": detail }));
    Ok(warp::reply::with_status(body, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use warp::Filter;

    #[derive(Deserialize)]
    struct Paging {
        #[allow(dead_code)]
        offset: Option<i64>,
    }

    #[tokio::test]
    async fn malformed_query_strings_are_a_client_error() {
        let filter = warp::query::<Paging>()
            .map(|_: Paging| warp::reply())
            .recover(handle_rejection);

        let res = warp::test::request()
            .path("/?offset=abc")
            .reply(&filter)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = warp::test::request().path("/?offset=3").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn domain_errors_keep_their_status_and_detail() {
        let filter = warp::any()
            .and_then(|| async {
                Err::<String, Rejection>(ApiError::not_found("No recipe exists").into())
            })
            .recover(handle_rejection);

        let res = warp::test::request().path("/").reply(&filter).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.body(), r#"{"detail":"No recipe exists"}"#);
    }
}
