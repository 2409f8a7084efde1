pub mod authz;
pub mod health;
