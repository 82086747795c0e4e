//! HTTP adapter for the backend authorization procedure.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use congrega_auth::{AccessRestriction, Filial, Profile, Role};
use congrega_core::{FilialId, IgrejaId, UserId};
use congrega_session::{AuthzGateway, ContextDecision, GatewayError, ResolvedContext};

/// Wire shape of the `resolve_user_context` RPC response.
#[derive(Debug, Deserialize)]
struct UserContextResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    profile: Option<ProfileDto>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    is_admin: bool,
    #[serde(default)]
    has_explicit_access: bool,
    #[serde(default)]
    allowed_filial_ids: Option<Vec<FilialId>>,
    #[serde(default)]
    filiais: Vec<FilialDto>,
}

#[derive(Debug, Deserialize)]
struct ProfileDto {
    id: UserId,
    igreja_id: IgrejaId,
    filial_id: Option<FilialId>,
    nome: String,
    igreja_nome: String,
    filial_nome: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FilialDto {
    id: FilialId,
    nome: String,
}

impl UserContextResponse {
    fn into_decision(self) -> ContextDecision {
        if !self.ok {
            return ContextDecision::Denied {
                reason: self
                    .error
                    .unwrap_or_else(|| "authorization procedure reported failure".to_string()),
            };
        }
        let Some(profile) = self.profile else {
            return ContextDecision::Denied {
                reason: "authorization procedure returned no profile".to_string(),
            };
        };

        ContextDecision::Granted(ResolvedContext {
            profile: Profile {
                id: profile.id,
                igreja_id: profile.igreja_id,
                filial_id: profile.filial_id,
                nome: profile.nome,
                igreja_nome: profile.igreja_nome,
                filial_nome: profile.filial_nome,
            },
            roles: self.roles.into_iter().map(Role::new).collect(),
            is_admin: self.is_admin,
            restriction: AccessRestriction {
                allowed_filiais: self
                    .allowed_filial_ids
                    .map(|ids| ids.into_iter().collect()),
                has_explicit_access: self.has_explicit_access,
            },
            filiais: self
                .filiais
                .into_iter()
                .map(|f| Filial::new(f.id, f.nome))
                .collect(),
        })
    }
}

/// Authorization gateway backed by the platform API.
///
/// One POST per resolution; the resolver above owns timeout and fallback
/// policy, so this adapter only maps transport and wire shapes.
pub struct HttpAuthzGateway {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpAuthzGateway {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token,
            client: reqwest::Client::new(),
        }
    }

    /// Configuration from `CONGREGA_API_URL` / `CONGREGA_API_TOKEN`.
    pub fn from_env() -> Self {
        let base_url = std::env::var("CONGREGA_API_URL").unwrap_or_else(|_| {
            tracing::warn!("CONGREGA_API_URL not set; using local dev default");
            "http://localhost:8080".to_string()
        });
        let token = std::env::var("CONGREGA_API_TOKEN").ok();
        Self::new(base_url, token)
    }

    fn endpoint(&self) -> String {
        format!("{}/rpc/resolve_user_context", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl AuthzGateway for HttpAuthzGateway {
    async fn resolve_context(&self, user_id: UserId) -> Result<ContextDecision, GatewayError> {
        let mut req = self
            .client
            .post(self.endpoint())
            .json(&json!({ "user_id": user_id }));

        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Api(status, body));
        }

        let payload: UserContextResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        Ok(payload.into_decision())
    }
}
