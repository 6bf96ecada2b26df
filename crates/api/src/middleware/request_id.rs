//! Request ID middleware for request tracing and correlation.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Ensure every request carries an `x-request-id`.
///
/// An upstream ID is kept; otherwise a UUID v4 is generated and written
/// into the request headers, so the trace span and handlers see the same
/// value. The ID is tagged on the Sentry scope and echoed on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let header = match request.headers().get(REQUEST_ID_HEADER) {
        Some(existing) => existing.clone(),
        None => {
            let generated = HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
            request
                .headers_mut()
                .insert(REQUEST_ID_HEADER, generated.clone());
            generated
        }
    };

    if let Ok(request_id) = header.to_str() {
        sentry::configure_scope(|scope| {
            scope.set_tag("request_id", request_id);
        });
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, header);
    response
}
