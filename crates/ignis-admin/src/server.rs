//! The admin HTTP surface. Built directly on
//! `hyper` + `hyper-util` + `http-body-util` rather than `axum`/`tower`:
//! the admin API is a handful of path-addressed verbs against one shared
//! tree, not a general routing surface, so the extra framework would add
//! indirection without buying anything back. Grounded on the bare-hyper
//! per-connection accept loop in the `naseejmesh` example pack.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;

use crate::error::AdminError;
use crate::store::{AdminMethod, AdminStore};

fn to_admin_method(method: &Method) -> Result<AdminMethod, AdminError> {
    match *method {
        Method::GET => Ok(AdminMethod::Get),
        Method::POST => Ok(AdminMethod::Post),
        Method::PUT => Ok(AdminMethod::Put),
        Method::PATCH => Ok(AdminMethod::Patch),
        Method::DELETE => Ok(AdminMethod::Delete),
        ref other => Err(AdminError::UnsupportedMethod(other.to_string())),
    }
}

/// `?force_reload=true` (or `=1`) bypasses the byte-identical no-op
/// short-circuit, mirroring `Supervisor::load`'s own `force_reload` flag.
fn wants_force_reload(uri: &hyper::Uri) -> bool {
    uri.query()
        .map(|q| q.split('&').any(|pair| pair == "force_reload=true" || pair == "force_reload=1"))
        .unwrap_or(false)
}

fn is_json_content_type(req: &Request<Incoming>) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

fn status_for(err: &AdminError) -> StatusCode {
    match err {
        AdminError::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
        AdminError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        AdminError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(body.into()))
        .expect("status and header are both well-formed")
}

async fn handle_request(store: Arc<AdminStore>, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = match to_admin_method(req.method()) {
        Ok(m) => m,
        Err(err) => return Ok(text_response(status_for(&err), err.to_string())),
    };
    let force_reload = wants_force_reload(req.uri());
    let path = req.uri().path().to_string();
    let json_content_type = is_json_content_type(&req);

    let body_bytes = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => return Ok(text_response(StatusCode::BAD_REQUEST, err.to_string())),
    };

    let body = if matches!(method, AdminMethod::Get | AdminMethod::Delete) || body_bytes.is_empty() {
        None
    } else if !json_content_type {
        return Ok(text_response(StatusCode::UNSUPPORTED_MEDIA_TYPE, AdminError::UnsupportedMediaType.to_string()));
    } else {
        match serde_json::from_slice(&body_bytes) {
            Ok(value) => Some(value),
            Err(err) => return Ok(text_response(StatusCode::BAD_REQUEST, err.to_string())),
        }
    };

    match store.handle(method, &path, body, force_reload) {
        Ok(Some(value)) => {
            let bytes = serde_json::to_vec(&value).unwrap_or_default();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "application/json")
                .body(Full::new(Bytes::from(bytes)))
                .expect("status and header are both well-formed"))
        }
        Ok(None) => Ok(text_response(StatusCode::OK, Bytes::new())),
        Err(err) => Ok(text_response(status_for(&err), err.to_string())),
    }
}

/// Serves the admin HTTP API at `addr` until the listener errors. Each
/// accepted connection gets its own task, handed to `hyper-util`'s auto
/// (HTTP/1 or HTTP/2) connection builder -- the same per-connection
/// task-spawn idiom `spark-transport-tcp` uses for its own accept loop.
pub async fn serve(store: Arc<AdminStore>, addr: SocketAddr) -> Result<(), AdminError> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "admin API listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(Arc::clone(&store), req));
            if let Err(err) = ConnBuilder::new(TokioExecutor::new()).serve_connection(io, service).await {
                tracing::warn!(%peer, error = %err, "admin connection closed with error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_reload_query_param_is_recognized() {
        let uri: hyper::Uri = "/config/apps?force_reload=true".parse().unwrap();
        assert!(wants_force_reload(&uri));
        let uri: hyper::Uri = "/config/apps".parse().unwrap();
        assert!(!wants_force_reload(&uri));
    }

    #[test]
    fn status_codes_match_the_error_table() {
        assert_eq!(status_for(&AdminError::UnsupportedMethod("TRACE".into())), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(status_for(&AdminError::UnsupportedMediaType), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
