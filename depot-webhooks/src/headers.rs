//! Request header and authentication assembly

use crate::signature::headers as names;
use crate::{Event, Subscription, WebhookSignature};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

/// Media type of every delivered payload
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Build the headers for one delivery.
///
/// Custom headers come first, then the signature, authorization and content
/// type, so the latter always win over a custom header of the same name.
pub fn assemble(
    subscription: &Subscription,
    event: &Event,
    payload: &[u8],
    delivery_id: &str,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, value) in subscription.custom_headers() {
        let parsed = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        );
        match parsed {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(
                subscription_id = %subscription.id,
                header = %name,
                "skipping custom header that is not valid HTTP"
            ),
        }
    }

    if let Some(secret) = non_empty(&subscription.signing_secret) {
        let signature = WebhookSignature::new(secret).sign(payload);
        insert(&mut headers, names::SIGNATURE, &signature);
    }

    if let Some(authorization) = authorization(subscription) {
        insert(&mut headers, AUTHORIZATION.as_str(), &authorization);
    }

    insert(&mut headers, names::EVENT, event.kind().as_str());
    insert(&mut headers, names::DELIVERY, delivery_id);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

    headers
}

/// Authorization header value; a bearer token wins over basic credentials
pub fn authorization(subscription: &Subscription) -> Option<String> {
    if let Some(token) = non_empty(&subscription.bearer_token) {
        return Some(format!("Bearer {}", token));
    }

    let username = non_empty(&subscription.basic_username);
    let password = non_empty(&subscription.basic_password);
    if username.is_none() && password.is_none() {
        return None;
    }

    let credentials = format!("{}:{}", username.unwrap_or(""), password.unwrap_or(""));
    Some(format!("Basic {}", STANDARD.encode(credentials)))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn insert(headers: &mut HeaderMap, name: &str, value: &str) {
    match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => warn!(header = name, "dropping header value that is not valid HTTP"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
        headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn event() -> Event {
        Event::added("maven", "com/acme/lib.jar")
    }

    #[test]
    fn test_minimal_headers() {
        let subscription = Subscription::new("maven", "https://example.com/hook");
        let headers = assemble(&subscription, &event(), b"{}", "d-1");

        assert_eq!(header(&headers, "content-type"), Some("application/json"));
        assert_eq!(header(&headers, "x-depot-event"), Some("add"));
        assert_eq!(header(&headers, "x-depot-delivery"), Some("d-1"));
        assert!(headers.get("authorization").is_none());
        assert!(headers.get("x-depot-signature").is_none());
    }

    #[test]
    fn test_signature_header() {
        let subscription = Subscription::builder("maven", "https://example.com/hook")
            .secret("s")
            .build();
        let payload = br#"{"kind":"add"}"#;
        let headers = assemble(&subscription, &event(), payload, "d-1");

        let expected = WebhookSignature::new("s").sign(payload);
        assert_eq!(header(&headers, "x-depot-signature"), Some(expected.as_str()));
    }

    #[test]
    fn test_empty_secret_does_not_sign() {
        let subscription = Subscription::builder("maven", "https://example.com/hook")
            .secret("")
            .build();
        let headers = assemble(&subscription, &event(), b"{}", "d-1");

        assert!(headers.get("x-depot-signature").is_none());
    }

    #[test]
    fn test_bearer_wins_over_basic() {
        let subscription = Subscription::builder("maven", "https://example.com/hook")
            .basic_auth("user", "pass")
            .bearer_token("tok")
            .build();
        let headers = assemble(&subscription, &event(), b"{}", "d-1");

        assert_eq!(header(&headers, "authorization"), Some("Bearer tok"));
    }

    #[test]
    fn test_basic_auth() {
        let subscription = Subscription::builder("maven", "https://example.com/hook")
            .basic_auth("user", "pass")
            .build();

        // base64("user:pass")
        assert_eq!(
            authorization(&subscription).as_deref(),
            Some("Basic dXNlcjpwYXNz")
        );
    }

    #[test]
    fn test_basic_auth_username_only() {
        let mut subscription = Subscription::new("maven", "https://example.com/hook");
        subscription.basic_username = Some("user".to_string());

        // base64("user:")
        assert_eq!(authorization(&subscription).as_deref(), Some("Basic dXNlcjo="));
    }

    #[test]
    fn test_content_type_overrides_custom_header() {
        let subscription = Subscription::builder("maven", "https://example.com/hook")
            .headers(&[("Content-Type", "text/plain"), ("X-Team", "platform")])
            .build();
        let headers = assemble(&subscription, &event(), b"{}", "d-1");

        assert_eq!(header(&headers, "content-type"), Some("application/json"));
        assert_eq!(headers.get_all("content-type").iter().count(), 1);
        assert_eq!(header(&headers, "x-team"), Some("platform"));
    }

    #[test]
    fn test_invalid_custom_header_skipped() {
        let subscription = Subscription::builder("maven", "https://example.com/hook")
            .headers_json(r#"{"Bad Header": "x", "X-Ok": "yes", "X-Newline": "a\nb"}"#)
            .build();
        let headers = assemble(&subscription, &event(), b"{}", "d-1");

        assert_eq!(header(&headers, "x-ok"), Some("yes"));
        assert!(headers.get("x-newline").is_none());
        assert_eq!(headers.len(), 4);
    }
}
