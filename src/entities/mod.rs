pub mod prelude;

pub mod audit_logs;
pub mod roles;
pub mod users;
