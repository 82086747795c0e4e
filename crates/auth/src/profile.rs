use serde::{Deserialize, Serialize};

use congrega_core::{FilialId, IgrejaId, UserId};

/// A filial (campus/location) as exposed for selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filial {
    pub id: FilialId,
    pub nome: String,
}

impl Filial {
    pub fn new(id: FilialId, nome: impl Into<String>) -> Self {
        Self { id, nome: nome.into() }
    }
}

/// The authenticated person's igreja-scoped identity.
///
/// Produced exclusively by the authorization backend; this component holds it
/// read-only. The profile's own `filial_id` is the fallback scope when no
/// valid override is in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub igreja_id: IgrejaId,
    pub filial_id: Option<FilialId>,
    pub nome: String,
    pub igreja_nome: String,
    pub filial_nome: Option<String>,
}
