//! The authorization collaborator contract.
//!
//! Two deployment shapes share this trait: a cloud provider that signs
//! requests against a fixed identity (an `AuthenticationError` from it is
//! terminal — there's nothing to refresh) and an on-prem provider that can
//! re-bootstrap a session login and retry (see the exception
//! classification table).

use crate::request::Request;
use async_trait::async_trait;
use nosql_core::NoSqlError;
use std::collections::HashMap;

#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    /// Produces the authorization string to stamp on the next attempt.
    async fn authorization_string(&self, request: &dyn Request) -> Result<String, NoSqlError>;

    /// Sanity-checks a string previously returned by this provider (used
    /// after a local cache hit, before it's sent on the wire).
    fn validate_auth_string(&self, auth_string: &str) -> Result<(), NoSqlError>;

    /// Stamps whatever headers the server expects alongside the
    /// authorization string (e.g. the compartment header for cloud auth).
    fn set_required_headers(
        &self,
        auth_string: &str,
        request: &dyn Request,
        headers: &mut HashMap<String, String>,
    ) -> Result<(), NoSqlError>;

    async fn close(&self);

    /// Re-establishes a session. Only on-prem providers support this;
    /// the default rejects it so cloud auth failures surface as terminal.
    async fn bootstrap_login(&self) -> Result<(), NoSqlError> {
        Err(NoSqlError::illegal_argument(
            "this authorization provider does not support re-bootstrapping a login",
        ))
    }

    /// Cloud auth failures are terminal; on-prem auth failures retry via
    /// `bootstrap_login`. Drives the `AuthenticationError` row of the
    /// exception classification table.
    fn is_cloud(&self) -> bool {
        false
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub struct NoopAuthProvider;

    #[async_trait]
    impl AuthorizationProvider for NoopAuthProvider {
        async fn authorization_string(&self, _request: &dyn Request) -> Result<String, NoSqlError> {
            Ok("Bearer test".to_string())
        }

        fn validate_auth_string(&self, _auth_string: &str) -> Result<(), NoSqlError> {
            Ok(())
        }

        fn set_required_headers(
            &self,
            auth_string: &str,
            _request: &dyn Request,
            headers: &mut HashMap<String, String>,
        ) -> Result<(), NoSqlError> {
            headers.insert("Authorization".to_string(), auth_string.to_string());
            Ok(())
        }

        async fn close(&self) {}
    }
}
