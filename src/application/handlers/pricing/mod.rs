//! Pricing handlers.
//!
//! Quotes are computed before a contract exists so the licensee can see
//! the terms. Contract creation runs the same computation again and never
//! takes the price from the request.

mod quote_price;

pub use quote_price::{QuotePriceHandler, QuotePriceQuery};
