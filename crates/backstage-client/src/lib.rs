//! Client library for the Backstage server: an HTTP SDK plus the
//! identity, role, routing, document-slot, form and realtime logic the
//! front end is built on.

pub mod api;
pub mod error;
pub mod form;
pub mod realtime;
pub mod role;
pub mod routes;
pub mod session;
pub mod slots;

pub use api::ApiClient;
pub use error::{ClientError, ClientResult};
