pub mod audit;
pub use audit::{AuditAction, AuditEntry, AuditService};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AccountSummary, AuthError, AuthService, Identity, LoginOutcome};
pub use auth_service_impl::SeaOrmAuthService;

pub mod lockout;
pub use lockout::{LockoutDecision, LockoutPolicy};

pub mod token;
pub use token::{Claims, TokenIssuer};
