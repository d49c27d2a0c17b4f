pub mod broadcast;
pub mod routes;
pub mod ws;

pub use routes::{router, AppState};
