use actix_web::HttpRequest;
use hmac::{Hmac, Mac};
use log::trace;
use sha2::Sha256;

pub type HmacSha256 = Hmac<Sha256>;

/// An HMAC-SHA256 over `data`, keyed with the webhook secret. `None` if no secret is configured.
pub fn webhook_mac(secret: &str, data: &[u8]) -> Option<HmacSha256> {
    if secret.is_empty() {
        return None;
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(data);
    Some(mac)
}

/// The base64 digest a courier sends in the `X-Courier-Signature` header. Empty if `secret` is.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    webhook_mac(secret, data).map(|mac| base64::encode(mac.finalize().into_bytes())).unwrap_or_default()
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    let header = req.headers().get("Authorization")?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ").or_else(|| header.strip_prefix("bearer "))?.trim();
    trace!("🔐️ Found bearer token in request");
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod test {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn hmac_is_base64_sha256() {
        // RFC 4231 test case 2
        let hmac = calculate_hmac("Jefe", b"what do ya want for nothing?");
        assert_eq!(hmac, "W9zBRr9gdU5qBCQmCJV1x1oAPwidJzmDnexYuWTsOEM=");
        assert!(calculate_hmac("", b"anything").is_empty());
        assert!(webhook_mac("", b"anything").is_none());
    }

    #[test]
    fn bearer_tokens() {
        let req = TestRequest::default().insert_header(("Authorization", "Bearer s3cret")).to_http_request();
        assert_eq!(bearer_token(&req), Some("s3cret".to_string()));
        let req = TestRequest::default().insert_header(("Authorization", "Basic czNjcmV0")).to_http_request();
        assert_eq!(bearer_token(&req), None);
        let req = TestRequest::default().insert_header(("Authorization", "Bearer ")).to_http_request();
        assert_eq!(bearer_token(&req), None);
        assert_eq!(bearer_token(&TestRequest::default().to_http_request()), None);
    }
}
