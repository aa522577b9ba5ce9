//! What happens to one reference.

use serde::{Deserialize, Serialize};

/// The rewrite chosen for one identifier or qualified reference.
///
/// Computed at most once per node; the visited registry guarantees a node is
/// never decided twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteDecision {
    /// Leave the reference as written
    Unchanged,
    /// Qualify a bare name (or replace an existing qualifier) with a namespace
    AddQualifier {
        /// Local name of the namespace
        qualifier: String,
        /// Symbol name after renaming
        name: String,
    },
    /// Delete a redundant qualifier by cutting its byte range
    RemoveQualifier {
        /// Symbol name after renaming
        name: String,
    },
    /// Keep the reference unqualified, only apply the rename rule
    RenameOnly {
        /// Symbol name after renaming
        name: String,
    },
    /// Replace a redundant qualifier with the placeholder token, to be
    /// stripped from the printed text
    MarkForTextualDeletion {
        /// Symbol name after renaming
        name: String,
    },
}

impl RewriteDecision {
    /// Variant tag
    pub fn kind(&self) -> DecisionKind {
        match self {
            Self::Unchanged => DecisionKind::Unchanged,
            Self::AddQualifier { .. } => DecisionKind::AddQualifier,
            Self::RemoveQualifier { .. } => DecisionKind::RemoveQualifier,
            Self::RenameOnly { .. } => DecisionKind::RenameOnly,
            Self::MarkForTextualDeletion { .. } => DecisionKind::MarkForTextualDeletion,
        }
    }

    /// Whether the decision drops the qualifier
    pub fn deletes_qualifier(&self) -> bool {
        matches!(
            self,
            Self::RemoveQualifier { .. } | Self::MarkForTextualDeletion { .. }
        )
    }
}

/// Variant tag of [`RewriteDecision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// [`RewriteDecision::Unchanged`]
    Unchanged,
    /// [`RewriteDecision::AddQualifier`]
    AddQualifier,
    /// [`RewriteDecision::RemoveQualifier`]
    RemoveQualifier,
    /// [`RewriteDecision::RenameOnly`]
    RenameOnly,
    /// [`RewriteDecision::MarkForTextualDeletion`]
    MarkForTextualDeletion,
}

/// Number of applied decisions per variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCounts {
    /// References examined and left alone
    pub unchanged: usize,
    /// Qualifiers added or replaced
    pub add_qualifier: usize,
    /// Qualifiers cut structurally
    pub remove_qualifier: usize,
    /// Renames without qualifier changes
    pub rename_only: usize,
    /// Qualifiers marked for textual deletion
    pub mark_for_textual_deletion: usize,
}

impl DecisionCounts {
    /// Count one decision
    pub fn record(&mut self, decision: &RewriteDecision) {
        let slot = match decision.kind() {
            DecisionKind::Unchanged => &mut self.unchanged,
            DecisionKind::AddQualifier => &mut self.add_qualifier,
            DecisionKind::RemoveQualifier => &mut self.remove_qualifier,
            DecisionKind::RenameOnly => &mut self.rename_only,
            DecisionKind::MarkForTextualDeletion => &mut self.mark_for_textual_deletion,
        };
        *slot += 1;
    }

    /// Add another tally to this one
    pub fn merge(&mut self, other: &DecisionCounts) {
        self.unchanged += other.unchanged;
        self.add_qualifier += other.add_qualifier;
        self.remove_qualifier += other.remove_qualifier;
        self.rename_only += other.rename_only;
        self.mark_for_textual_deletion += other.mark_for_textual_deletion;
    }

    /// Number of decisions that changed the source
    pub fn changes(&self) -> usize {
        self.add_qualifier + self.remove_qualifier + self.rename_only + self.mark_for_textual_deletion
    }
}
