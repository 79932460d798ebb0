pub mod health;
pub mod pull_requests;
pub mod stats;
pub mod team;
pub mod users;
