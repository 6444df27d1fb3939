use std::fmt;
use thiserror::Error;

/// Separator between tenant and session id in a stored key.
pub const KEY_SEPARATOR: char = ':';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Tenant id must not be empty")]
    EmptyTenant,

    #[error("Tenant id must not contain ':': {0}")]
    SeparatorInTenant(String),

    #[error("Session id must not be empty")]
    EmptySession,
}

/// Tenant identifier. Never contains the key separator, so the
/// `"{tenant}:"` prefix unambiguously marks a tenant's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Result<Self, KeyError> {
        let id = id.into();
        if id.is_empty() {
            return Err(KeyError::EmptyTenant);
        }
        if id.contains(KEY_SEPARATOR) {
            return Err(KeyError::SeparatorInTenant(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key prefix shared by every session of this tenant, e.g. `"999999:"`.
    pub fn namespace_prefix(&self) -> String {
        format!("{}{}", self.0, KEY_SEPARATOR)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Composite `(tenant, session)` key, rendered as `"tenant:session"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    tenant: TenantId,
    session_id: String,
}

impl SessionKey {
    pub fn new(tenant: TenantId, session_id: impl Into<String>) -> Result<Self, KeyError> {
        let session_id = session_id.into();
        if session_id.trim().is_empty() {
            return Err(KeyError::EmptySession);
        }
        Ok(Self { tenant, session_id })
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.tenant, KEY_SEPARATOR, self.session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format_tenant_first() {
        let tenant = TenantId::new("999999").unwrap();
        let key = SessionKey::new(tenant.clone(), "abc").unwrap();
        assert_eq!(key.to_string(), "999999:abc");
        assert!(key.to_string().starts_with(&tenant.namespace_prefix()));
    }

    #[test]
    fn test_tenant_validation() {
        assert_eq!(TenantId::new(""), Err(KeyError::EmptyTenant));
        assert!(matches!(
            TenantId::new("a:b"),
            Err(KeyError::SeparatorInTenant(_))
        ));
    }

    #[test]
    fn test_empty_session_rejected() {
        let tenant = TenantId::new("999999").unwrap();
        assert_eq!(SessionKey::new(tenant, "  "), Err(KeyError::EmptySession));
    }
}
