//! HTTP adapter for contract endpoints.
//!
//! Exposes the licensing lifecycle via REST API:
//! - `POST /api/contracts` - Request a licence
//! - `GET /api/contracts/:id` - Contract details
//! - `POST /api/contracts/:id/{accept,reject,withdraw}` - Lifecycle decisions
//! - `POST /api/contracts/:id/reaction-video` - Attach the reaction video
//! - `POST /api/contracts/:id/checkout` and `/checkout/cancel` - Payment
//! - `POST /api/contracts/:id/usage` - Metered usage reports
//! - `DELETE /api/admin/contracts/:id` - Admin delete
//! - `POST /api/pricing/quote` - Price quote
//! - `POST /api/webhooks/stripe` - Handle Stripe webhooks

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{AuthenticatedUser, ContractApiError, ContractAppState};
pub use routes::contract_router;
