use serde::{Deserialize, Serialize};
use std::fmt;

/// Login credentials for the Nuve platform.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Authenticated session, sent as the `Cookie` header on every call after login.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    cookie: String,
}

impl Session {
    /// Parse the first `Set-Cookie` value of a login response.
    ///
    /// Only the leading `name=value` pair is kept; attributes such as
    /// `Path` or `HttpOnly` are not meant to be echoed back.
    pub fn from_set_cookie(header: &str) -> Option<Self> {
        let pair = header.split(';').next()?.trim();
        let (name, value) = pair.split_once('=')?;
        if name.trim().is_empty() || value.trim().is_empty() {
            return None;
        }
        Some(Self {
            cookie: pair.to_string(),
        })
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    /// Cookie value without its name, used to register the secret for masking.
    pub fn token(&self) -> &str {
        self.cookie
            .split_once('=')
            .map(|(_, value)| value)
            .unwrap_or(&self.cookie)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("cookie", &"***").finish()
    }
}

/// Identity returned by `/auth/check`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Instance {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub external_ip: Option<String>,
    #[serde(default)]
    pub backup: Option<InstanceBackup>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InstanceBackup {
    #[serde(default)]
    pub unique_name: Option<String>,
    #[serde(default)]
    pub version: Option<BackupVersion>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BackupVersion {
    #[serde(default)]
    pub package: Option<BackupPackage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BackupPackage {
    #[serde(default)]
    pub config: Option<SapSystemConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SapSystemConfig {
    #[serde(default)]
    pub sap_system_id: Option<String>,
    #[serde(default)]
    pub sap_system_no: Option<String>,
}

impl Instance {
    /// SAP system id of the backup this instance was provisioned from, if known.
    pub fn sap_system_id(&self) -> Option<&str> {
        self.backup
            .as_ref()?
            .version
            .as_ref()?
            .package
            .as_ref()?
            .config
            .as_ref()?
            .sap_system_id
            .as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_keeps_only_name_value_pair() {
        let session =
            Session::from_set_cookie("access_token=abc.def; Path=/; HttpOnly; Secure").unwrap();
        assert_eq!(session.cookie(), "access_token=abc.def");
        assert_eq!(session.token(), "abc.def");
    }

    #[test]
    fn test_session_rejects_malformed_cookie() {
        assert!(Session::from_set_cookie("").is_none());
        assert!(Session::from_set_cookie("no-equals-sign; Path=/").is_none());
        assert!(Session::from_set_cookie("=value").is_none());
        assert!(Session::from_set_cookie("name=; Path=/").is_none());
    }

    #[test]
    fn test_secrets_hidden_from_debug() {
        let credentials = Credentials::new("ci@example.com", "hunter2");
        let session = Session::from_set_cookie("token=s3cr3t").unwrap();
        let rendered = format!("{credentials:?} {session:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("ci@example.com"));
    }

    #[test]
    fn test_instance_parses_full_and_sparse_payloads() {
        let full: Instance = serde_json::from_value(json!({
            "id": 42,
            "name": "qa-s4",
            "status": "running",
            "external_ip": "10.0.0.4",
            "backup": {
                "unique_name": "s4-2023",
                "version": {"package": {"config": {"sap_system_id": "S4H", "sap_system_no": "00"}}}
            }
        }))
        .unwrap();
        assert_eq!(full.sap_system_id(), Some("S4H"));

        let sparse: Instance = serde_json::from_value(json!({"id": 7, "name": "dev"})).unwrap();
        assert_eq!(sparse.status, "");
        assert_eq!(sparse.sap_system_id(), None);
    }
}
