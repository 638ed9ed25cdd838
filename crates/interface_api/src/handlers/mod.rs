//! Request handlers, one module per area

pub mod customers;
pub mod finance;
pub mod fiscal;
pub mod health;
pub mod hr;
pub mod investments;
pub mod loyalty;
pub mod orders;
pub mod receivables;
pub mod whatsapp;
