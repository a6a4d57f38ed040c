//! Driven adapters for services reached over HTTP rather than through the database

pub mod identity_toolkit;
pub mod push_gateway;
