//! Licence document service client.

mod http_document_generator;

pub use http_document_generator::{DocumentServiceConfig, HttpDocumentGenerator};
