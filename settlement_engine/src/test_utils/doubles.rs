//! In-memory stand-ins for the card processor and the courier. They record every call so tests can assert on how
//! often an external side effect was requested.
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;

use crate::{
    db_types::CourierStatus,
    traits::{
        AuthorizationRequest,
        AuthorizationResult,
        CaptureResult,
        CourierError,
        CourierProvider,
        CourierQuote,
        DeliveryBooking,
        DeliveryRequest,
        PaymentProcessor,
        ProcessorError,
        RemotePaymentState,
        TransferResult,
    },
};
use settle_common::Money;

#[derive(Debug, Default)]
struct ProcessorState {
    authorize_calls: usize,
    capture_calls: usize,
    release_calls: usize,
    transfer_calls: usize,
    captured: HashSet<String>,
    released: HashSet<String>,
    transfers: HashMap<String, (Money, String)>,
    capture_failures: Vec<ProcessorError>,
    decline_authorizations: bool,
    fail_transfers: bool,
    capture_delay: Option<Duration>,
}

/// A card processor that approves everything unless told otherwise.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessor {
    state: Arc<Mutex<ProcessorState>>,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut ProcessorState) -> T) -> T {
        let mut state = self.state.lock().expect("processor state poisoned");
        f(&mut state)
    }

    pub fn authorize_calls(&self) -> usize {
        self.with_state(|s| s.authorize_calls)
    }

    pub fn capture_calls(&self) -> usize {
        self.with_state(|s| s.capture_calls)
    }

    pub fn release_calls(&self) -> usize {
        self.with_state(|s| s.release_calls)
    }

    pub fn transfer_calls(&self) -> usize {
        self.with_state(|s| s.transfer_calls)
    }

    /// Distinct payouts, keyed by idempotency key.
    pub fn transfers(&self) -> HashMap<String, (Money, String)> {
        self.with_state(|s| s.transfers.clone())
    }

    /// The next capture call fails with `error`. Queued failures are used in order.
    pub fn fail_next_capture(&self, error: ProcessorError) {
        self.with_state(|s| s.capture_failures.push(error));
    }

    pub fn decline_authorizations(&self, decline: bool) {
        self.with_state(|s| s.decline_authorizations = decline);
    }

    pub fn fail_transfers(&self, fail: bool) {
        self.with_state(|s| s.fail_transfers = fail);
    }

    /// Makes every capture take `delay`, to widen race windows.
    pub fn set_capture_delay(&self, delay: Duration) {
        self.with_state(|s| s.capture_delay = Some(delay));
    }
}

impl PaymentProcessor for FakeProcessor {
    async fn authorize(&self, request: AuthorizationRequest) -> Result<AuthorizationResult, ProcessorError> {
        self.with_state(|s| {
            s.authorize_calls += 1;
            if s.decline_authorizations {
                return Err(ProcessorError::Declined("card declined".into()));
            }
            Ok(AuthorizationResult { hold_ref: format!("hold_{}", request.order_id), expires_at: None })
        })
    }

    async fn capture(
        &self,
        hold_ref: &str,
        amount: Money,
        _idempotency_key: &str,
    ) -> Result<CaptureResult, ProcessorError> {
        let delay = self.with_state(|s| {
            s.capture_calls += 1;
            s.capture_delay
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.with_state(|s| {
            if !s.capture_failures.is_empty() {
                return Err(s.capture_failures.remove(0));
            }
            if s.released.contains(hold_ref) {
                return Err(ProcessorError::Fatal(format!("hold {hold_ref} was released")));
            }
            if !s.captured.insert(hold_ref.to_string()) {
                return Err(ProcessorError::AlreadyCaptured);
            }
            Ok(CaptureResult { capture_ref: format!("cap_{hold_ref}"), amount })
        })
    }

    async fn release(&self, hold_ref: &str) -> Result<(), ProcessorError> {
        self.with_state(|s| {
            s.release_calls += 1;
            s.released.insert(hold_ref.to_string());
            Ok(())
        })
    }

    async fn transfer(
        &self,
        amount: Money,
        destination: &str,
        idempotency_key: &str,
    ) -> Result<TransferResult, ProcessorError> {
        self.with_state(|s| {
            s.transfer_calls += 1;
            if s.fail_transfers {
                return Err(ProcessorError::Retryable("payout rail unavailable".into()));
            }
            s.transfers.entry(idempotency_key.to_string()).or_insert_with(|| (amount, destination.to_string()));
            Ok(TransferResult { transfer_ref: format!("tr_{idempotency_key}") })
        })
    }

    async fn retrieve(&self, hold_ref: &str) -> Result<RemotePaymentState, ProcessorError> {
        self.with_state(|s| {
            if s.captured.contains(hold_ref) {
                Ok(RemotePaymentState::Captured)
            } else if s.released.contains(hold_ref) {
                Ok(RemotePaymentState::Canceled)
            } else {
                Ok(RemotePaymentState::Authorized)
            }
        })
    }
}

#[derive(Debug)]
struct CourierState {
    quote_fee: Money,
    quote_calls: usize,
    create_calls: usize,
    cancel_calls: usize,
    statuses: HashMap<String, CourierStatus>,
    unavailable: bool,
}

/// A courier whose quotes are whatever the test says they are.
#[derive(Debug, Clone)]
pub struct FakeCourier {
    state: Arc<Mutex<CourierState>>,
}

impl Default for FakeCourier {
    fn default() -> Self {
        Self::new(Money::from_cents(1000))
    }
}

impl FakeCourier {
    pub fn new(quote_fee: Money) -> Self {
        let state = CourierState {
            quote_fee,
            quote_calls: 0,
            create_calls: 0,
            cancel_calls: 0,
            statuses: HashMap::new(),
            unavailable: false,
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut CourierState) -> T) -> T {
        let mut state = self.state.lock().expect("courier state poisoned");
        f(&mut state)
    }

    pub fn set_quote_fee(&self, fee: Money) {
        self.with_state(|s| s.quote_fee = fee);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.with_state(|s| s.unavailable = unavailable);
    }

    /// What `get_status` reports for the delivery from now on.
    pub fn set_status(&self, delivery_id: &str, status: CourierStatus) {
        self.with_state(|s| s.statuses.insert(delivery_id.to_string(), status));
    }

    pub fn quote_calls(&self) -> usize {
        self.with_state(|s| s.quote_calls)
    }

    pub fn create_calls(&self) -> usize {
        self.with_state(|s| s.create_calls)
    }

    /// The courier's view of a delivery, if it was ever booked.
    pub fn status_of(&self, delivery_id: &str) -> Option<CourierStatus> {
        self.with_state(|s| s.statuses.get(delivery_id).copied())
    }

    pub fn cancel_calls(&self) -> usize {
        self.with_state(|s| s.cancel_calls)
    }

    fn booking(delivery_id: &str, fee: Money, status: CourierStatus) -> DeliveryBooking {
        DeliveryBooking {
            delivery_id: delivery_id.to_string(),
            fee,
            status,
            tracking_url: Some(format!("https://courier.example/track/{delivery_id}")),
            courier_name: Some("Robin".into()),
            pickup_eta: None,
            dropoff_eta: None,
        }
    }
}

impl CourierProvider for FakeCourier {
    async fn quote(&self, request: &DeliveryRequest) -> Result<CourierQuote, CourierError> {
        self.with_state(|s| {
            s.quote_calls += 1;
            if s.unavailable {
                return Err(CourierError::Retryable("no couriers nearby".into()));
            }
            let suffix = request.order_id.as_ref().map(|o| o.to_string()).unwrap_or_else(|| "cart".into());
            Ok(CourierQuote {
                quote_id: format!("q_{suffix}_{}", s.quote_calls),
                fee: s.quote_fee,
                expires_at: Some(Utc::now() + chrono::Duration::minutes(15)),
            })
        })
    }

    async fn create_delivery(&self, request: &DeliveryRequest) -> Result<DeliveryBooking, CourierError> {
        self.with_state(|s| {
            s.create_calls += 1;
            if s.unavailable {
                return Err(CourierError::Retryable("no couriers nearby".into()));
            }
            let order_id = request.order_id.as_ref().ok_or_else(|| CourierError::Fatal("missing order id".into()))?;
            let mut delivery_id = format!("dlv_{order_id}");
            if s.statuses.contains_key(&delivery_id) {
                delivery_id = format!("dlv_{order_id}-{}", s.create_calls);
            }
            s.statuses.insert(delivery_id.clone(), CourierStatus::Pending);
            Ok(Self::booking(&delivery_id, s.quote_fee, CourierStatus::Pending))
        })
    }

    async fn get_status(&self, delivery_id: &str) -> Result<DeliveryBooking, CourierError> {
        self.with_state(|s| {
            let status = s
                .statuses
                .get(delivery_id)
                .copied()
                .ok_or_else(|| CourierError::DeliveryNotFound(delivery_id.to_string()))?;
            Ok(Self::booking(delivery_id, s.quote_fee, status))
        })
    }

    async fn cancel(&self, delivery_id: &str) -> Result<(), CourierError> {
        self.with_state(|s| {
            s.cancel_calls += 1;
            s.statuses.insert(delivery_id.to_string(), CourierStatus::Canceled);
            Ok(())
        })
    }
}
