use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::context::ActorContext;

/// Header carrying the acting operator's label.
pub const ACTOR_HEADER: &str = "x-user";

/// Attach an [`ActorContext`] to every request. Never rejects.
pub async fn actor_middleware(mut req: Request, next: Next) -> Response {
    let actor = extract_actor(req.headers());
    req.extensions_mut().insert(ActorContext::new(actor));
    next.run(req).await
}

fn extract_actor(headers: &HeaderMap) -> String {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn missing_header_yields_empty_actor() {
        assert_eq!(extract_actor(&HeaderMap::new()), "");
    }

    #[test]
    fn header_value_is_used_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_HEADER, HeaderValue::from_static("rrhh.carla"));
        assert_eq!(extract_actor(&headers), "rrhh.carla");
    }

    #[test]
    fn non_utf8_header_yields_empty_actor() {
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_HEADER, HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap());
        assert_eq!(extract_actor(&headers), "");
    }
}
