//! Typed credential presentation.
//!
//! Every outbound request goes through [`AuthStrategy::apply`], so there is
//! exactly one place that decides which header carries a key.

use reqwest::RequestBuilder;

use crate::service::AuthScheme;

/// How a single request presents its credential.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy<'a> {
    /// `Authorization: Bearer <token>`.
    Bearer(&'a str),
    /// `<name>: <value>`.
    ApiKeyHeader { name: &'static str, value: &'a str },
    /// Anonymous request.
    None,
}

impl<'a> AuthStrategy<'a> {
    /// Build the strategy a descriptor's scheme calls for.
    #[must_use]
    pub fn for_scheme(scheme: AuthScheme, key: &'a str) -> Self {
        match scheme {
            AuthScheme::Bearer => Self::Bearer(key),
            AuthScheme::ApiKey { header } => Self::ApiKeyHeader {
                name: header,
                value: key,
            },
            AuthScheme::None => Self::None,
        }
    }

    /// Attach the credential to a request.
    #[must_use]
    pub fn apply(self, req: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Bearer(token) => req.bearer_auth(token),
            Self::ApiKeyHeader { name, value } => req.header(name, value),
            Self::None => req,
        }
    }
}

// Keys must never reach logs through a stray `{:?}`.
impl std::fmt::Debug for AuthStrategy<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(***)"),
            Self::ApiKeyHeader { name, .. } => write!(f, "ApiKeyHeader({name}, ***)"),
            Self::None => f.write_str("None"),
        }
    }
}
