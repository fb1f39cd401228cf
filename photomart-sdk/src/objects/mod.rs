pub mod checkout;
pub mod razorpay;

pub use checkout::{
    CreateOrderRequest, CreateOrderResponse, ErrorResponse, PhotoRef, VerifyPaymentRequest,
    VerifyPaymentResponse, WebhookAck,
};
pub use razorpay::{OrderEntity, PaymentEntity, PaymentStatus, WebhookEnvelope};
