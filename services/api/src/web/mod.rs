pub mod auth;
pub mod middleware;
pub mod profile;
pub mod rest;
pub mod state;

#[cfg(test)]
mod testing;

pub use middleware::require_auth;
pub use rest::{
    guest_problems_handler, list_problems_handler, list_statuses_handler,
    refresh_problems_handler, update_memo_handler, update_status_handler,
};
