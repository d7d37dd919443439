use super::errors::DeprovisionError;
use super::types::{Account, Credentials, Instance, Session};
use crate::http::{ApiClient, ApiRequest};
use crate::redact::SecretRegistry;
use async_trait::async_trait;
use reqwest::header::SET_COOKIE;
use reqwest::Method;
use serde_json::json;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://app.nuveplatform.com/api";

/// Nuve platform operations used by the deprovision workflow.
///
/// Every call after `login` takes the [`Session`] explicitly, so the client
/// itself holds no authentication state.
#[async_trait]
pub trait NuvePlatform: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<Session, DeprovisionError>;
    async fn check_identity(&self, session: &Session) -> Result<Account, DeprovisionError>;
    async fn list_instances(
        &self,
        session: &Session,
        account: &Account,
    ) -> Result<Vec<Instance>, DeprovisionError>;
    async fn delete_instance(
        &self,
        session: &Session,
        account: &Account,
        instance_id: u64,
    ) -> Result<(), DeprovisionError>;
}

#[derive(Debug, Clone)]
pub struct NuveClient {
    api: ApiClient,
}

impl NuveClient {
    pub fn new(base_url: &str, secrets: SecretRegistry) -> Result<Self, DeprovisionError> {
        Ok(Self {
            api: ApiClient::new(base_url, secrets)?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.api.base_url()
    }
}

fn instances_path(account: &Account) -> String {
    format!("/organizations/{}/instances", account.slug)
}

#[async_trait]
impl NuvePlatform for NuveClient {
    async fn login(&self, credentials: &Credentials) -> Result<Session, DeprovisionError> {
        let request = ApiRequest::new(Method::POST, "/auth/login")
            .json(json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .sensitive();
        let response = self.api.execute(request).await?;

        let set_cookie = response
            .headers
            .get_all(SET_COOKIE)
            .iter()
            .next()
            .ok_or_else(|| {
                DeprovisionError::Authentication(
                    "Couldn't set Cookie header: login response carried no session cookie".into(),
                )
            })?;
        let raw = set_cookie.to_str().map_err(|_| {
            DeprovisionError::Authentication("Couldn't set Cookie header: cookie is not valid text".into())
        })?;
        let session = Session::from_set_cookie(raw).ok_or_else(|| {
            DeprovisionError::Authentication("Couldn't set Cookie header: cookie is malformed".into())
        })?;

        self.api.secrets().register(session.token());
        debug!("Session established");
        Ok(session)
    }

    async fn check_identity(&self, session: &Session) -> Result<Account, DeprovisionError> {
        let request = ApiRequest::new(Method::GET, "/auth/check").cookie(session.cookie());
        self.api.execute(request).await?.json()
    }

    async fn list_instances(
        &self,
        session: &Session,
        account: &Account,
    ) -> Result<Vec<Instance>, DeprovisionError> {
        let request = ApiRequest::new(Method::GET, instances_path(account)).cookie(session.cookie());
        self.api.execute(request).await?.json()
    }

    async fn delete_instance(
        &self,
        session: &Session,
        account: &Account,
        instance_id: u64,
    ) -> Result<(), DeprovisionError> {
        let path = format!("{}/{instance_id}", instances_path(account));
        let request = ApiRequest::new(Method::DELETE, path).cookie(session.cookie());
        self.api.execute(request).await?;
        Ok(())
    }
}
