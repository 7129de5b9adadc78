//! Courier webhook signatures.
//!
//! The courier signs each webhook call with HMAC-SHA256 over the raw body, keyed with the shared webhook secret
//! (`MKT_COURIER_WEBHOOK_SECRET`), and sends the base64 digest in [`COURIER_SIGNATURE_HEADER`].
//! [`CourierSignature`] holds that contract and checks a request against it. [`CourierSignatureGuard`] applies the
//! check to a resource, buffering the body so the handler can still read it.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ResponseError,
    http::{header::HeaderMap, StatusCode},
    web,
    Error,
    FromRequest,
};
use futures::future::LocalBoxFuture;
use hmac::Mac;
use log::{trace, warn};
use settle_common::Secret;
use thiserror::Error;

use crate::helpers::webhook_mac;

pub const COURIER_SIGNATURE_HEADER: &str = "X-Courier-Signature";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Webhook signatures cannot be verified.")]
    NotConfigured,
    #[error("No courier signature found.")]
    Missing,
    #[error("The courier signature is not valid base64.")]
    Malformed,
    #[error("Invalid courier signature.")]
    Mismatch,
}

impl ResponseError for SignatureError {
    fn status_code(&self) -> StatusCode {
        StatusCode::FORBIDDEN
    }
}

/// How the courier authenticates its webhook calls.
#[derive(Clone, Debug)]
pub struct CourierSignature {
    header: String,
    secret: Secret<String>,
    /// When false, every call is let through unchecked. **DANGER**
    enforced: bool,
}

impl CourierSignature {
    pub fn new(secret: Secret<String>, enforced: bool) -> Self {
        Self { header: COURIER_SIGNATURE_HEADER.to_string(), secret, enforced }
    }

    pub fn with_header(mut self, header: &str) -> Self {
        self.header = header.to_string();
        self
    }

    pub fn is_enforced(&self) -> bool {
        self.enforced
    }

    /// Checks the signature header against `body`. The digest comparison runs in constant time.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), SignatureError> {
        if !self.enforced {
            return Ok(());
        }
        let mac = webhook_mac(self.secret.reveal(), body).ok_or(SignatureError::NotConfigured)?;
        let claimed = headers.get(self.header.as_str()).ok_or(SignatureError::Missing)?;
        let claimed = base64::decode(claimed.as_bytes()).map_err(|_| SignatureError::Malformed)?;
        mac.verify_slice(&claimed).map_err(|_| SignatureError::Mismatch)
    }
}

/// Rejects webhook calls that fail [`CourierSignature::verify`] with a 403 before they reach the handler.
pub struct CourierSignatureGuard {
    signature: Rc<CourierSignature>,
}

impl CourierSignatureGuard {
    pub fn new(signature: CourierSignature) -> Self {
        if !signature.is_enforced() {
            warn!("🔐️ Courier webhook signatures are not being checked");
        }
        Self { signature: Rc::new(signature) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for CourierSignatureGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = CourierSignatureService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CourierSignatureService { signature: Rc::clone(&self.signature), service: Rc::new(service) }))
    }
}

pub struct CourierSignatureService<S> {
    signature: Rc<CourierSignature>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for CourierSignatureService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let signature = Rc::clone(&self.signature);
        Box::pin(async move {
            let (http_req, mut payload) = req.into_parts();
            let body = web::Bytes::from_request(&http_req, &mut payload).await?;
            if let Err(e) = signature.verify(http_req.headers(), &body) {
                warn!("🔐️ Courier webhook for {} refused: {e}", http_req.path());
                return Err(e.into());
            }
            trace!("🔐️ Courier signature accepted");
            let req = ServiceRequest::from_parts(http_req, replay(body));
            service.call(req).await
        })
    }
}

/// A payload that yields `body` again.
fn replay(body: web::Bytes) -> Payload {
    let (_, mut payload) = h1::Payload::create(true);
    payload.unread_data(body);
    Payload::from(payload)
}

#[cfg(test)]
mod test {
    use actix_web::test::TestRequest;

    use super::*;
    use crate::helpers::calculate_hmac;

    const BODY: &[u8] = br#"{"deliveryId":"dlv_1","status":"delivered"}"#;

    fn headers(signature: Option<&str>) -> HeaderMap {
        let mut req = TestRequest::default();
        if let Some(signature) = signature {
            req = req.insert_header((COURIER_SIGNATURE_HEADER, signature));
        }
        req.to_http_request().headers().clone()
    }

    fn signature() -> CourierSignature {
        CourierSignature::new(Secret::new("courier-secret".to_string()), true)
    }

    #[test]
    fn accepts_the_courier_digest() {
        let digest = calculate_hmac("courier-secret", BODY);
        assert_eq!(signature().verify(&headers(Some(&digest)), BODY), Ok(()));
    }

    #[test]
    fn refuses_missing_malformed_and_foreign_signatures() {
        let sig = signature();
        assert_eq!(sig.verify(&headers(None), BODY), Err(SignatureError::Missing));
        assert_eq!(sig.verify(&headers(Some("not base64!")), BODY), Err(SignatureError::Malformed));
        let foreign = calculate_hmac("someone-else", BODY);
        assert_eq!(sig.verify(&headers(Some(&foreign)), BODY), Err(SignatureError::Mismatch));
        let digest = calculate_hmac("courier-secret", BODY);
        assert_eq!(sig.verify(&headers(Some(&digest)), b"{}"), Err(SignatureError::Mismatch));
    }

    #[test]
    fn custom_header_names() {
        let sig = signature().with_header("X-Webhook-Digest");
        let digest = calculate_hmac("courier-secret", BODY);
        assert_eq!(sig.verify(&headers(Some(&digest)), BODY), Err(SignatureError::Missing));
        let req = TestRequest::default().insert_header(("X-Webhook-Digest", digest)).to_http_request();
        assert_eq!(sig.verify(req.headers(), BODY), Ok(()));
    }

    #[test]
    fn an_empty_secret_refuses_everything() {
        let sig = CourierSignature::new(Secret::default(), true);
        let digest = calculate_hmac("", BODY);
        assert_eq!(sig.verify(&headers(Some(&digest)), BODY), Err(SignatureError::NotConfigured));
        assert_eq!(SignatureError::NotConfigured.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn unenforced_signatures_let_everything_through() {
        let sig = CourierSignature::new(Secret::default(), false);
        assert_eq!(sig.verify(&headers(None), BODY), Ok(()));
    }
}
