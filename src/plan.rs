//! Update plan: every extracted statement with its admission decision.

use serde::Serialize;

use crate::admission::{AdmissionPolicy, Decision, admit};
use crate::catalog::ExistingObjectSet;
use crate::statement::RawStatement;

/// One statement of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStatement {
    /// 1-based position in the schema file.
    pub position: usize,
    pub kind: String,
    pub target: Option<String>,
    /// Statement as written in the schema file.
    pub original: String,
    #[serde(flatten)]
    pub decision: Decision,
    pub flagged: bool,
    /// Destructive, admitted under the override.
    pub overridden: bool,
}

impl PlannedStatement {
    /// SQL to run, if the statement was admitted.
    pub fn sql(&self) -> Option<&str> {
        match &self.decision {
            Decision::Admit => Some(&self.original),
            Decision::Rewrite { sql } => Some(sql),
            Decision::Reject { .. } => None,
        }
    }

    pub fn is_admitted(&self) -> bool {
        self.decision.is_admitted()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub statements: Vec<PlannedStatement>,
}

impl Plan {
    /// Run admission over `statements` in file order.
    pub fn build(
        statements: &[RawStatement],
        existing: &mut ExistingObjectSet,
        policy: &AdmissionPolicy,
    ) -> Self {
        let statements = statements
            .iter()
            .map(|statement| {
                let admission = admit(existing, statement, policy);
                PlannedStatement {
                    position: statement.position,
                    kind: statement.kind().to_string(),
                    target: statement
                        .target()
                        .map(|t| existing.qualify(t).to_string()),
                    original: statement.text.clone(),
                    decision: admission.decision,
                    flagged: admission.flagged,
                    overridden: admission.overridden,
                }
            })
            .collect();
        Self { statements }
    }

    pub fn admitted(&self) -> impl Iterator<Item = &PlannedStatement> {
        self.statements.iter().filter(|s| s.is_admitted())
    }

    pub fn rejected(&self) -> impl Iterator<Item = &PlannedStatement> {
        self.statements.iter().filter(|s| !s.is_admitted())
    }

    pub fn flagged(&self) -> impl Iterator<Item = &PlannedStatement> {
        self.statements.iter().filter(|s| s.flagged)
    }

    pub fn overridden(&self) -> impl Iterator<Item = &PlannedStatement> {
        self.statements.iter().filter(|s| s.overridden)
    }

    pub fn admitted_count(&self) -> usize {
        self.admitted().count()
    }

    pub fn extracted_count(&self) -> usize {
        self.statements.len()
    }

    /// Nothing left to apply.
    pub fn is_up_to_date(&self) -> bool {
        self.admitted_count() == 0
    }
}
