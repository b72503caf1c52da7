pub use super::audit_logs::Entity as AuditLogs;
pub use super::roles::Entity as Roles;
pub use super::users::Entity as Users;
