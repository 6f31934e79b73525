pub mod admin;
pub mod auth;
pub mod documents;
pub mod error;
pub mod events;
pub mod gateway;
pub mod import;
pub mod leads;
pub mod media;
pub mod middleware;
pub mod objects;
pub mod profiles;
pub mod router;
pub mod state;
pub mod upload;

pub use router::router;
pub use state::{AppState, AppStateInner};
