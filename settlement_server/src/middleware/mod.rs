mod bearer;
mod courier_signature;

pub use bearer::{BearerTokenMiddlewareFactory, BearerTokenMiddlewareService};
pub use courier_signature::{
    CourierSignature,
    CourierSignatureGuard,
    CourierSignatureService,
    SignatureError,
    COURIER_SIGNATURE_HEADER,
};
