//! Compliance collaborator.
//!
//! Every store is checked before any side effect. A rejection aborts the
//! store with no tier write, no embedding call, and no event. A checker
//! error fails closed: content that could not be checked is not stored.

use async_trait::async_trait;
use thiserror::Error;

use crate::context::ContextType;
use crate::dst::{FaultInjector, FaultType};

pub type ComplianceResult<T> = Result<T, ComplianceError>;

#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("compliance checker unavailable: {reason}")]
    Unavailable { reason: String },
}

impl ComplianceError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Verdict on one piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplianceVerdict {
    Approved,
    Rejected { reason: String },
}

impl ComplianceVerdict {
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Content compliance boundary.
#[async_trait]
pub trait ComplianceChecker: Send + Sync {
    async fn check(
        &self,
        context_type: ContextType,
        content: &str,
    ) -> ComplianceResult<ComplianceVerdict>;
}

/// Deterministic checker for simulation: rejects content containing any
/// configured banned term, approves everything else.
pub struct SimComplianceChecker {
    banned_terms: Vec<String>,
    fault_injector: Option<FaultInjector>,
}

impl SimComplianceChecker {
    /// Approves everything.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            banned_terms: Vec::new(),
            fault_injector: None,
        }
    }

    #[must_use]
    pub fn with_banned_terms(terms: Vec<String>) -> Self {
        Self {
            banned_terms: terms,
            fault_injector: None,
        }
    }

    #[must_use]
    pub fn with_fault_injector(mut self, injector: FaultInjector) -> Self {
        self.fault_injector = Some(injector);
        self
    }
}

#[async_trait]
impl ComplianceChecker for SimComplianceChecker {
    async fn check(
        &self,
        context_type: ContextType,
        content: &str,
    ) -> ComplianceResult<ComplianceVerdict> {
        if let Some(injector) = &self.fault_injector {
            if injector.should_inject(FaultType::ComplianceFail, "check") {
                return Err(ComplianceError::unavailable("injected fault"));
            }
        }

        for term in &self.banned_terms {
            if content.contains(term.as_str()) {
                tracing::debug!(%context_type, term, "content rejected");
                return Ok(ComplianceVerdict::Rejected {
                    reason: format!("content contains banned term \"{term}\""),
                });
            }
        }
        Ok(ComplianceVerdict::Approved)
    }
}
