use serde::{Deserialize, Serialize};

use congrega_core::{FilialId, IgrejaId};

use crate::{AccessRestriction, Filial, Profile};

/// The user's last explicit filial-viewing choice.
///
/// Either the tenant-wide "all filiais" view or one specific filial. The
/// session layer persists this across restarts; composition re-validates it
/// on every read, so a choice invalidated by a later restriction change
/// silently degrades instead of erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilialOverride {
    pub filial_id: Option<FilialId>,
    pub is_all_filiais: bool,
}

impl FilialOverride {
    /// Normalize a raw choice: the all-filiais view never carries a filial id.
    pub fn new(filial_id: Option<FilialId>, is_all_filiais: bool) -> Self {
        Self {
            filial_id: if is_all_filiais { None } else { filial_id },
            is_all_filiais,
        }
    }

    pub fn all_filiais() -> Self {
        Self { filial_id: None, is_all_filiais: true }
    }

    pub fn filial(filial_id: FilialId) -> Self {
        Self { filial_id: Some(filial_id), is_all_filiais: false }
    }
}

/// The single effective (igreja, filial) pair the rest of the application
/// consumes. Derived state: recomputed on read, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EffectiveScope {
    pub igreja_id: Option<IgrejaId>,
    pub igreja_nome: Option<String>,
    pub filial_id: Option<FilialId>,
    pub filial_nome: Option<String>,
    pub is_all_filiais: bool,
}

impl EffectiveScope {
    /// Scope before any successful resolution: no igreja at all.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Compose the effective scope from resolved context plus the user's choice.
///
/// - No IO
/// - No panics
/// - No mutation (pure policy)
///
/// Precedence, first match wins:
/// 1. no profile → empty scope;
/// 2. override = all filiais, and the restriction allows the all view;
/// 3. override names a filial the restriction permits (name looked up from
///    `filiais`, `None` when not listed);
/// 4. otherwise the profile's own default filial.
///
/// An override that is no longer valid degrades silently to the profile
/// default rather than erroring.
pub fn effective_scope(
    profile: Option<&Profile>,
    choice: Option<&FilialOverride>,
    is_admin: bool,
    restriction: &AccessRestriction,
    filiais: &[Filial],
) -> EffectiveScope {
    let Some(profile) = profile else {
        return EffectiveScope::empty();
    };

    if let Some(choice) = choice {
        if choice.is_all_filiais && restriction.can_view_all(is_admin) {
            return EffectiveScope {
                igreja_id: Some(profile.igreja_id),
                igreja_nome: Some(profile.igreja_nome.clone()),
                filial_id: None,
                filial_nome: None,
                is_all_filiais: true,
            };
        }

        if let Some(filial_id) = choice.filial_id {
            if !choice.is_all_filiais && restriction.permits(filial_id) {
                return EffectiveScope {
                    igreja_id: Some(profile.igreja_id),
                    igreja_nome: Some(profile.igreja_nome.clone()),
                    filial_id: Some(filial_id),
                    filial_nome: lookup_nome(filiais, filial_id),
                    is_all_filiais: false,
                };
            }
        }
    }

    EffectiveScope {
        igreja_id: Some(profile.igreja_id),
        igreja_nome: Some(profile.igreja_nome.clone()),
        filial_id: profile.filial_id,
        filial_nome: profile.filial_nome.clone(),
        is_all_filiais: false,
    }
}

fn lookup_nome(filiais: &[Filial], filial_id: FilialId) -> Option<String> {
    filiais
        .iter()
        .find(|f| f.id == filial_id)
        .map(|f| f.nome.clone())
}
