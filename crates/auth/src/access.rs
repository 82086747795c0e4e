use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use congrega_core::FilialId;

/// Which filiais a user may view.
///
/// `allowed_filiais` is `None` when no restriction is in force (any filial,
/// including the tenant-wide "all filiais" view, is selectable). A concrete
/// set means every filial choice must be validated against it.
///
/// `has_explicit_access` records that the grant was deliberate rather than
/// defaulted. An explicit grant whose set happens to be `None` is still
/// treated as filial-scoped: it does not confer the all-filiais view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessRestriction {
    pub allowed_filiais: Option<HashSet<FilialId>>,
    pub has_explicit_access: bool,
}

impl AccessRestriction {
    /// No restriction, no explicit grant (the default for ordinary members).
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Restriction limited to a concrete set of filiais.
    pub fn limited_to(filiais: impl IntoIterator<Item = FilialId>) -> Self {
        Self {
            allowed_filiais: Some(filiais.into_iter().collect()),
            has_explicit_access: true,
        }
    }

    /// Whether a specific filial may be selected under this restriction.
    pub fn permits(&self, filial_id: FilialId) -> bool {
        match &self.allowed_filiais {
            None => true,
            Some(allowed) => allowed.contains(&filial_id),
        }
    }

    /// Whether the tenant-wide "all filiais" view may be selected.
    ///
    /// Admins always may. Otherwise only true default/unrestricted users
    /// qualify: an explicit grant is presumed filial-scoped even when its
    /// restriction set is absent.
    pub fn can_view_all(&self, is_admin: bool) -> bool {
        is_admin || (self.allowed_filiais.is_none() && !self.has_explicit_access)
    }
}
