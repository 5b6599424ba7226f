//! Entities, value objects and the pure rules of the pledge workflow, plus the
//! ports through which the application layer reaches storage and mail.

pub mod catalog;
pub mod currency;
pub mod fees;
pub mod money;
pub mod notification;
pub mod ports;
pub mod project;
pub mod reward;
pub mod session;
pub mod transaction;
