//! Detection of structural smells and security anti-patterns.

mod security;
mod smells;
mod types;

pub use security::{scan_security, scan_security_with};
pub use smells::scan_smells;
pub use types::{
    RiskKind, RiskLevel, SecurityFinding, SecurityScan, Severity, SmellFinding, SmellKind,
    SmellScan,
};
