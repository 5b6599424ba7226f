//! Application layer: the services that orchestrate the ports.
//!
//! The payment pipeline is built around `gateway::PaymentGateway`. Gateways
//! are registered on a `GatewayDispatcher`, which `Notifier`, `Payments` and
//! `TransactionService` broadcast their hooks through.

pub mod admin;
pub mod collections;
pub mod content;
pub mod gateway;
pub mod manual;
pub mod notifier;
pub mod payments;
pub mod pledge;
pub mod registry;
pub mod routes;
pub mod toolkit;
