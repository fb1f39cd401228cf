#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod entities;
pub mod framework;
pub mod gateway;
pub mod identity;
pub mod ledger;
pub mod pipeline;
pub mod storage;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
