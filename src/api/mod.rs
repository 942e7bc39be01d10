pub mod cors;
pub mod health;
pub mod routes;
