//! In-memory collaborators for exercising [`crate::pipeline::PaymentPipeline`]
//! without network access.

use crate::gateway::{GatewayError, NewGatewayOrder, PaymentGateway, VerifiedPayment};
use crate::identity::{Caller, IdentityError, IdentityVerifier};
use crate::storage::{StorageError, UrlSigner};
use async_trait::async_trait;
use photomart_sdk::objects::OrderEntity;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared, ordered record of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Accepts a fixed set of tokens.
#[derive(Debug, Default)]
pub struct FakeIdentity {
    tokens: HashMap<String, Caller>,
    log: CallLog,
}

impl FakeIdentity {
    pub fn new(log: CallLog) -> Self {
        Self {
            tokens: HashMap::new(),
            log,
        }
    }

    pub fn with_token(mut self, token: &str, caller: Caller) -> Self {
        self.tokens.insert(token.to_owned(), caller);
        self
    }
}

#[async_trait]
impl IdentityVerifier for FakeIdentity {
    async fn verify_token(&self, token: &str) -> Result<Caller, IdentityError> {
        self.log.push("identity.verify");
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| IdentityError::Invalid("unknown token".to_owned()))
    }
}

/// Serves payments from a table and opens orders with sequential ids.
#[derive(Debug, Default)]
pub struct FakeGateway {
    payments: Mutex<HashMap<String, VerifiedPayment>>,
    opened: Mutex<Vec<NewGatewayOrder>>,
    log: CallLog,
}

impl FakeGateway {
    pub fn new(log: CallLog) -> Self {
        Self {
            payments: Mutex::default(),
            opened: Mutex::default(),
            log,
        }
    }

    pub fn put_payment(&self, payment: VerifiedPayment) {
        self.payments
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(payment.id.clone(), payment);
    }

    pub fn opened_orders(&self) -> Vec<NewGatewayOrder> {
        self.opened.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn fetch_payment(&self, payment_id: &str) -> Result<VerifiedPayment, GatewayError> {
        self.log.push(format!("gateway.fetch_payment:{payment_id}"));
        self.payments
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::Api {
                status: 400,
                message: "The id provided does not exist".to_owned(),
            })
    }

    async fn create_order(&self, order: NewGatewayOrder) -> Result<OrderEntity, GatewayError> {
        self.log.push("gateway.create_order");
        let mut opened = self.opened.lock().unwrap_or_else(|e| e.into_inner());
        opened.push(order.clone());
        Ok(OrderEntity {
            id: format!("order_fake{}", opened.len()),
            amount: order.amount,
            currency: order.currency,
            status: Some("created".to_owned()),
            receipt: Some(order.receipt),
        })
    }
}

/// Deterministic signer: `https://storage.test/{object}?expires={secs}`.
#[derive(Debug, Default)]
pub struct FakeSigner {
    log: CallLog,
}

impl FakeSigner {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl UrlSigner for FakeSigner {
    async fn signed_url(&self, object: &str, ttl: Duration) -> Result<String, StorageError> {
        self.log.push(format!("storage.sign:{object}"));
        Ok(format!(
            "https://storage.test/{object}?expires={}",
            ttl.as_secs()
        ))
    }
}

/// A payment as the gateway reports it.
pub fn payment(
    id: &str,
    order_id: &str,
    status: crate::gateway::PaymentStatus,
    amount: i64,
) -> VerifiedPayment {
    VerifiedPayment {
        id: id.to_owned(),
        order_id: Some(order_id.to_owned()),
        status,
        amount,
        currency: "INR".to_owned(),
        method: Some("card".to_owned()),
        email: None,
        contact: None,
    }
}
