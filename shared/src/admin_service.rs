use crate::http::make_boxed_error_response;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::future::{Ready, ready};

/// Liveness and readiness endpoints served on the admin listener.
///
/// `/health` always answers `ok`. `/ready` answers `ok` only while the
/// `is_ready` probe returns true.
pub struct AdminService<F> {
    is_ready: F,
}

impl<F> AdminService<F>
where
    F: Fn() -> bool,
{
    pub fn new(is_ready: F) -> Self {
        Self { is_ready }
    }

    fn respond(&self, method: &Method, path: &str) -> Response<BoxBody<Bytes, Infallible>> {
        let ok_body = || Full::new(Bytes::from("ok\n")).boxed();

        if method != Method::GET && method != Method::HEAD {
            return make_boxed_error_response(StatusCode::METHOD_NOT_ALLOWED);
        }

        match path {
            "/health" => Response::new(ok_body()),
            "/ready" => match (self.is_ready)() {
                true => Response::new(ok_body()),
                false => make_boxed_error_response(StatusCode::SERVICE_UNAVAILABLE),
            },
            _ => make_boxed_error_response(StatusCode::NOT_FOUND),
        }
    }
}

impl<F, B> Service<Request<B>> for AdminService<F>
where
    F: Fn() -> bool,
{
    type Response = Response<BoxBody<Bytes, Infallible>>;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        ready(Ok(self.respond(req.method(), req.uri().path())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(path: &str) -> Request<()> {
        Request::builder().uri(path).body(()).unwrap()
    }

    async fn status_of<F: Fn() -> bool>(service: &AdminService<F>, req: Request<()>) -> StatusCode {
        service.call(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let ready = AdminService::new(|| true);
        assert_eq!(status_of(&ready, get("/health")).await, StatusCode::OK);
        assert_eq!(status_of(&ready, get("/ready")).await, StatusCode::OK);
        assert_eq!(status_of(&ready, get("/other")).await, StatusCode::NOT_FOUND);

        let not_ready = AdminService::new(|| false);
        assert_eq!(status_of(&not_ready, get("/health")).await, StatusCode::OK);
        assert_eq!(
            status_of(&not_ready, get("/ready")).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_rejects_post() {
        let service = AdminService::new(|| true);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/health")
            .body(())
            .unwrap();
        assert_eq!(
            status_of(&service, req).await,
            StatusCode::METHOD_NOT_ALLOWED
        );
    }
}
