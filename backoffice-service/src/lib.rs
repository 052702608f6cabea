//! Back-office service: catalogue, clients, suppliers, quotes and invoices.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
