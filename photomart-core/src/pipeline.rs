//! Payment verification and order fulfillment.
//!
//! Two paths lead to a fulfilled purchase:
//!
//! - the buyer's client posts the checkout callback to `/verify-payment`
//!   ([`PaymentPipeline::fulfill`]);
//! - the gateway posts a signed event to `/webhook`
//!   ([`PaymentPipeline::receive_webhook`]).
//!
//! Both end in the same delivery step, which mints the download link
//! and writes the order and the purchase under the composite purchase id.
//! Whichever path runs second overwrites the first with equivalent content.

use crate::config::RazorpayConfig;
use crate::entities::{
    InsertWebhookEvent, OrderRecord, OrderStatus, UpsertOrder, UpsertPurchase, purchase_id,
};
use crate::gateway::{GatewayError, NewGatewayOrder, PaymentGateway, PaymentStatus, VerifiedPayment};
use crate::identity::{self, Caller, IdentityError, IdentityVerifier};
use crate::ledger::{Ledger, LedgerError};
use crate::storage::{self, StorageError, UrlSigner};
use photomart_sdk::objects::{
    CreateOrderRequest, CreateOrderResponse, PhotoRef, VerifyPaymentRequest, WebhookEnvelope,
};
use photomart_sdk::signature;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Recorded on every purchase.
pub const GATEWAY_NAME: &str = "razorpay";

/// Webhook events that can complete a pending order.
pub const RECONCILED_EVENTS: [&str; 3] = ["payment.captured", "payment.authorized", "order.paid"];

const DEFAULT_CURRENCY: &str = "INR";

/// Razorpay caps receipts at 40 characters.
const MAX_RECEIPT_LEN: usize = 40;

/// Which signature failed to verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    Payment,
    Webhook,
}

impl std::fmt::Display for SignatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureKind::Payment => write!(f, "payment"),
            SignatureKind::Webhook => write!(f, "webhook"),
        }
    }
}

/// The external system behind an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamProvider {
    Identity,
    Gateway,
    Storage,
    Database,
}

impl UpstreamProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamProvider::Identity => "firebase-auth",
            UpstreamProvider::Gateway => "razorpay",
            UpstreamProvider::Storage => "storage",
            UpstreamProvider::Database => "database",
        }
    }
}

impl std::fmt::Display for UpstreamProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request was refused.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("Missing bearer token")]
    AuthMissing,

    #[error("Invalid or expired token")]
    AuthInvalid { reason: String },

    #[error("{0}")]
    Validation(String),

    #[error("Invalid {0} signature")]
    SignatureInvalid(SignatureKind),

    #[error("Payment not completed")]
    PaymentNotComplete { status: PaymentStatus },

    #[error("{message}")]
    Upstream {
        provider: UpstreamProvider,
        message: String,
    },
}

impl FulfillmentError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            FulfillmentError::AuthMissing => "AUTH_MISSING",
            FulfillmentError::AuthInvalid { .. } => "AUTH_INVALID",
            FulfillmentError::Validation(_) => "VALIDATION_ERROR",
            FulfillmentError::SignatureInvalid(_) => "SIGNATURE_INVALID",
            FulfillmentError::PaymentNotComplete { .. } => "PAYMENT_NOT_COMPLETE",
            FulfillmentError::Upstream { .. } => "UPSTREAM_FAILURE",
        }
    }

    fn validation(message: &str) -> Self {
        FulfillmentError::Validation(message.to_owned())
    }
}

impl From<IdentityError> for FulfillmentError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::Missing => FulfillmentError::AuthMissing,
            IdentityError::Invalid(reason) => FulfillmentError::AuthInvalid { reason },
            IdentityError::Upstream(message) => FulfillmentError::Upstream {
                provider: UpstreamProvider::Identity,
                message,
            },
        }
    }
}

impl From<GatewayError> for FulfillmentError {
    fn from(e: GatewayError) -> Self {
        let message = match e {
            GatewayError::Api { message, .. } => message,
            other => other.to_string(),
        };
        FulfillmentError::Upstream {
            provider: UpstreamProvider::Gateway,
            message,
        }
    }
}

impl From<StorageError> for FulfillmentError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::MissingPath => FulfillmentError::validation("Missing photo storage path"),
            other => FulfillmentError::Upstream {
                provider: UpstreamProvider::Storage,
                message: other.to_string(),
            },
        }
    }
}

impl From<LedgerError> for FulfillmentError {
    fn from(e: LedgerError) -> Self {
        FulfillmentError::Upstream {
            provider: UpstreamProvider::Database,
            message: e.to_string(),
        }
    }
}

/// A purchase that has been paid for, recorded, and can be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfilledPurchase {
    pub purchase_id: String,
    pub download_url: String,
}

/// What became of a signature-valid webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Logged; the event type is not one that completes orders.
    Logged,
    /// Logged, but the referenced order carries no buyer or photo, or the
    /// payment is not in a fulfillable state.
    Unreconciled,
    /// Logged; the purchase was already recorded.
    AlreadyFulfilled { purchase_id: String },
    /// Logged and the purchase recorded.
    Fulfilled(FulfilledPurchase),
}

/// The top-level `event` field of a webhook body.
#[derive(Deserialize)]
struct EventName {
    event: String,
}

/// A client payment claim with every required field present.
struct PaymentClaim {
    order_id: String,
    payment_id: String,
    signature: String,
    photo: PhotoRef,
}

impl PaymentClaim {
    fn parse(request: VerifyPaymentRequest) -> Result<Self, FulfillmentError> {
        fn required(field: Option<String>) -> Option<String> {
            field
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        }
        let (Some(order_id), Some(payment_id), Some(signature)) = (
            required(request.order_id),
            required(request.payment_id),
            required(request.signature),
        ) else {
            return Err(FulfillmentError::validation(
                "Missing razorpay_order_id, razorpay_payment_id or razorpay_signature",
            ));
        };
        let photo = request
            .photo
            .ok_or_else(|| FulfillmentError::validation("Missing photo"))?;
        // Reject before any network call; the path is normalized again when signing.
        storage::normalize_storage_path(photo.storage_path.as_deref().unwrap_or_default())?;
        Ok(Self {
            order_id,
            payment_id,
            signature,
            photo,
        })
    }

    /// Hold the claim to the buyer and photo already on record for its
    /// order. Returns the photo to deliver.
    fn bind_to(&self, order: &OrderRecord, caller: &Caller) -> Result<PhotoRef, FulfillmentError> {
        if let Some(owner) = order.buyer_uid.as_deref() {
            if owner != caller.uid {
                warn!(order_id = %self.order_id, owner = %owner, "Order belongs to another buyer");
                return Err(FulfillmentError::validation(
                    "Order belongs to a different buyer",
                ));
            }
        }
        let Some(stored) = order.photo.as_ref() else {
            return Ok(self.photo.clone());
        };
        let stored_path =
            storage::normalize_storage_path(stored.0.storage_path.as_deref().unwrap_or_default())?;
        let claimed_path =
            storage::normalize_storage_path(self.photo.storage_path.as_deref().unwrap_or_default())?;
        if stored_path != claimed_path {
            warn!(order_id = %self.order_id, "Claimed photo differs from the ordered one");
            return Err(FulfillmentError::validation(
                "Photo does not match this order",
            ));
        }
        Ok(stored.0.clone())
    }
}

/// Everything [`PaymentPipeline::deliver`] needs to complete a purchase.
struct Delivery<'a> {
    order_id: &'a str,
    payment: &'a VerifiedPayment,
    buyer_uid: &'a str,
    buyer_email: Option<String>,
    photo: &'a PhotoRef,
    signature: Option<String>,
}

/// Orchestrates identity, signature, gateway, storage and ledger.
pub struct PaymentPipeline {
    identity: Arc<dyn IdentityVerifier>,
    gateway: Arc<dyn PaymentGateway>,
    signer: Arc<dyn UrlSigner>,
    ledger: Arc<dyn Ledger>,
    razorpay: RazorpayConfig,
    url_ttl: Duration,
}

impl PaymentPipeline {
    pub fn new(
        identity: Arc<dyn IdentityVerifier>,
        gateway: Arc<dyn PaymentGateway>,
        signer: Arc<dyn UrlSigner>,
        ledger: Arc<dyn Ledger>,
        razorpay: RazorpayConfig,
        url_ttl: Duration,
    ) -> Self {
        Self {
            identity,
            gateway,
            signer,
            ledger,
            razorpay,
            url_ttl,
        }
    }

    /// Authenticate the raw `Authorization` header value.
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<Caller, FulfillmentError> {
        Ok(identity::authenticate(self.identity.as_ref(), authorization).await?)
    }

    /// Verify a client-reported payment and fulfill it.
    ///
    /// Nothing is written unless the signature verifies, the claim agrees
    /// with the buyer and photo already recorded for the order, and the
    /// gateway reports the payment as captured or authorized.
    #[tracing::instrument(skip_all, err, fields(uid = %caller.uid))]
    pub async fn fulfill(
        &self,
        caller: &Caller,
        request: VerifyPaymentRequest,
    ) -> Result<FulfilledPurchase, FulfillmentError> {
        let claim = PaymentClaim::parse(request)?;

        if !signature::verify_payment(
            &claim.order_id,
            &claim.payment_id,
            &claim.signature,
            self.razorpay.key_secret_bytes(),
        ) {
            warn!(order_id = %claim.order_id, payment_id = %claim.payment_id, "Payment signature mismatch");
            return Err(FulfillmentError::SignatureInvalid(SignatureKind::Payment));
        }

        let photo = match self.ledger.find_order(&claim.order_id).await? {
            Some(order) => claim.bind_to(&order, caller)?,
            None => claim.photo.clone(),
        };

        let payment = self.gateway.fetch_payment(&claim.payment_id).await?;
        if !payment.status.is_fulfillable() {
            info!(
                order_id = %claim.order_id,
                payment_id = %claim.payment_id,
                status = %payment.status,
                "Payment not in a fulfillable state"
            );
            return Err(FulfillmentError::PaymentNotComplete {
                status: payment.status,
            });
        }
        if let Some(gateway_order) = payment.order_id.as_deref() {
            if gateway_order != claim.order_id {
                warn!(
                    order_id = %claim.order_id,
                    gateway_order_id = %gateway_order,
                    "Payment belongs to a different order"
                );
                return Err(FulfillmentError::validation(
                    "Payment does not belong to this order",
                ));
            }
        }

        self.deliver(Delivery {
            order_id: &claim.order_id,
            payment: &payment,
            buyer_uid: &caller.uid,
            buyer_email: caller.email.clone().or_else(|| payment.email.clone()),
            photo: &photo,
            signature: Some(claim.signature.clone()),
        })
        .await
    }

    /// Grant access to the asset and record the order and the purchase.
    async fn deliver(&self, delivery: Delivery<'_>) -> Result<FulfilledPurchase, FulfillmentError> {
        let Delivery {
            order_id,
            payment,
            buyer_uid,
            buyer_email,
            photo,
            signature,
        } = delivery;

        let access = storage::grant(
            self.signer.as_ref(),
            photo.storage_path.as_deref().unwrap_or_default(),
            self.url_ttl,
        )
        .await?;
        let purchase_id = purchase_id(order_id, &payment.id);

        let order = UpsertOrder {
            order_id: order_id.to_owned(),
            status: Some(OrderStatus::Paid),
            buyer_uid: Some(buyer_uid.to_owned()),
            buyer_email: buyer_email.clone(),
            payment_id: Some(payment.id.clone()),
            signature,
            amount: Some(payment.amount),
            currency: Some(payment.currency.clone()),
            payment: Some(payment.clone()),
            photo: Some(photo.clone()),
            paid_at: Some(time::OffsetDateTime::now_utc()),
        };
        let purchase = UpsertPurchase {
            purchase_id: purchase_id.clone(),
            order_id: order_id.to_owned(),
            payment_id: payment.id.clone(),
            buyer_uid: buyer_uid.to_owned(),
            buyer_email,
            photo_id: photo.id.clone(),
            price: photo.price,
            amount: payment.amount,
            currency: payment.currency.clone(),
            file_name: photo.file_name.clone(),
            display_name: photo.display_name.clone(),
            storage_path: access.object,
            download_url: access.url.clone(),
            gateway: GATEWAY_NAME.to_owned(),
        };
        self.ledger.record(order, purchase).await?;

        info!(purchase_id = %purchase_id, order_id = %order_id, buyer_uid = %buyer_uid, "Purchase recorded");
        Ok(FulfilledPurchase {
            purchase_id,
            download_url: access.url,
        })
    }

    /// Open a gateway order for the checkout widget and remember who is
    /// buying what, so a webhook can complete the order on its own.
    #[tracing::instrument(skip_all, err, fields(uid = %caller.uid))]
    pub async fn create_order(
        &self,
        caller: &Caller,
        request: CreateOrderRequest,
    ) -> Result<CreateOrderResponse, FulfillmentError> {
        if request.amount <= 0 {
            return Err(FulfillmentError::validation("Amount must be positive"));
        }
        let photo = request
            .photo
            .ok_or_else(|| FulfillmentError::validation("Missing photo"))?;
        storage::normalize_storage_path(photo.storage_path.as_deref().unwrap_or_default())?;
        let currency = request
            .currency
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_owned());

        let created = self
            .gateway
            .create_order(NewGatewayOrder {
                amount: request.amount,
                currency: currency.clone(),
                receipt: photo.id.chars().take(MAX_RECEIPT_LEN).collect(),
                notes: BTreeMap::from([
                    ("buyer_uid".to_owned(), caller.uid.clone()),
                    ("photo_id".to_owned(), photo.id.clone()),
                ]),
            })
            .await?;

        self.ledger
            .upsert_order(UpsertOrder {
                order_id: created.id.clone(),
                status: Some(OrderStatus::Created),
                buyer_uid: Some(caller.uid.clone()),
                buyer_email: caller.email.clone(),
                amount: Some(created.amount),
                currency: Some(created.currency.clone()),
                photo: Some(photo),
                ..Default::default()
            })
            .await?;

        info!(order_id = %created.id, amount = created.amount, "Checkout order created");
        Ok(CreateOrderResponse {
            order_id: created.id,
            amount: created.amount,
            currency: created.currency,
            key_id: self.razorpay.key_id.clone(),
        })
    }

    /// Verify, log and, where possible, act on a gateway webhook delivery.
    ///
    /// `body` must be the request body exactly as received.
    #[tracing::instrument(skip_all, err)]
    pub async fn receive_webhook(
        &self,
        signature_header: Option<&str>,
        event_id: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookOutcome, FulfillmentError> {
        let given = signature_header.unwrap_or_default();
        if !signature::verify_webhook(body, given, self.razorpay.webhook_secret_bytes()) {
            warn!("Webhook signature mismatch");
            return Err(FulfillmentError::SignatureInvalid(SignatureKind::Webhook));
        }

        // The event name is read on its own so a payload that does not fit
        // the envelope is still logged under its real type.
        let event_type = serde_json::from_slice::<EventName>(body)
            .map_or_else(|_| "unknown".to_owned(), |e| e.event);
        let envelope = match serde_json::from_slice::<WebhookEnvelope>(body) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                warn!(event = %event_type, error = %e, "Webhook body is not a recognizable event");
                None
            }
        };
        let log_id = self
            .ledger
            .append_webhook(InsertWebhookEvent {
                event_type: event_type.clone(),
                event_id: event_id.map(str::to_owned),
                payload: String::from_utf8_lossy(body).into_owned(),
            })
            .await?;
        info!(log_id, event = %event_type, "Webhook logged");

        match envelope {
            Some(envelope) => self.reconcile(&envelope).await,
            None => Ok(WebhookOutcome::Logged),
        }
    }

    async fn reconcile(&self, envelope: &WebhookEnvelope) -> Result<WebhookOutcome, FulfillmentError> {
        if !RECONCILED_EVENTS.contains(&envelope.event.as_str()) {
            return Ok(WebhookOutcome::Logged);
        }
        let (Some(payment), Some(order_id)) = (envelope.payment(), envelope.order_id()) else {
            debug!(event = %envelope.event, "Event carries no payment and order");
            return Ok(WebhookOutcome::Unreconciled);
        };
        if !payment.status.is_fulfillable() {
            debug!(payment_id = %payment.id, status = %payment.status, "Event payment not fulfillable");
            return Ok(WebhookOutcome::Unreconciled);
        }

        let Some(order) = self.ledger.find_order(order_id).await? else {
            debug!(order_id = %order_id, "Event refers to an unknown order");
            return Ok(WebhookOutcome::Unreconciled);
        };
        let (Some(buyer_uid), Some(photo)) = (order.buyer_uid.as_deref(), order.photo.as_ref()) else {
            debug!(order_id = %order_id, "Order has no buyer or photo to fulfill");
            return Ok(WebhookOutcome::Unreconciled);
        };

        let purchase_id = purchase_id(order_id, &payment.id);
        if self.ledger.find_purchase(&purchase_id).await?.is_some() {
            debug!(purchase_id = %purchase_id, "Purchase already recorded");
            return Ok(WebhookOutcome::AlreadyFulfilled { purchase_id });
        }

        let fulfilled = self
            .deliver(Delivery {
                order_id,
                payment,
                buyer_uid,
                buyer_email: order.buyer_email.clone().or_else(|| payment.email.clone()),
                photo: &photo.0,
                signature: None,
            })
            .await?;
        Ok(WebhookOutcome::Fulfilled(fulfilled))
    }
}
