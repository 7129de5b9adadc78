//! Bearer token middleware.
//!
//! Guards operator endpoints, such as the capture sweep, that are meant to be called by a scheduler holding a shared
//! token. Requests without `Authorization: Bearer <token>`, or with the wrong token, get a 401. If no token is
//! configured, every request is refused.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use settle_common::Secret;

use crate::{errors::ServerError, helpers::bearer_token};

pub struct BearerTokenMiddlewareFactory {
    token: Secret<String>,
}

impl BearerTokenMiddlewareFactory {
    pub fn new(token: Secret<String>) -> Self {
        BearerTokenMiddlewareFactory { token }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BearerTokenMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = BearerTokenMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BearerTokenMiddlewareService { token: self.token.clone(), service: Rc::new(service) }))
    }
}

pub struct BearerTokenMiddlewareService<S> {
    token: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for BearerTokenMiddlewareService<S>
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
        let expected = self.token.clone();
        Box::pin(async move {
            if expected.is_empty() {
                warn!("🔐️ No access token is configured for {}. Denying access.", req.path());
                return Err(ServerError::Unauthorized.into());
            }
            match bearer_token(req.request()) {
                Some(token) if token == *expected.reveal() => {
                    trace!("🔐️ Bearer token for {} ✅️", req.path());
                    service.call(req).await
                },
                Some(_) => {
                    warn!("🔐️ Wrong bearer token supplied for {}. Denying access.", req.path());
                    Err(ServerError::Unauthorized.into())
                },
                None => {
                    warn!("🔐️ No bearer token supplied for {}. Denying access.", req.path());
                    Err(ServerError::Unauthorized.into())
                },
            }
        })
    }
}
