// crates/integration-gate-core/src/runtime/auth.rs
// ============================================================================
// Module: Auth Builder
// Description: Maps decrypted credentials and an auth method to request material.
// Purpose: Produce the headers and query parameters that authenticate a call.
// Dependencies: base64, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`apply_auth`] is pure and total. Missing credential fields produce no
//! header rather than an error; the upstream decides how to answer an
//! unauthenticated request. Body placement for API keys is handled by the
//! request builder through [`body_auth_fields`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::core::ApiKeyPlacement;
use crate::core::AuthMethod;
use crate::core::HeaderValueSource;
use crate::core::TokenPlacement;
use crate::interfaces::Credentials;

// ============================================================================
// SECTION: Credential Fields
// ============================================================================

/// Credential field holding a bearer token.
pub const TOKEN_FIELD: &str = "token";
/// Credential field holding an API key.
pub const API_KEY_FIELD: &str = "apiKey";
/// Credential field holding an OAuth2 access token.
pub const ACCESS_TOKEN_FIELD: &str = "accessToken";
/// Query parameter used for OAuth2 query placement.
pub const ACCESS_TOKEN_QUERY_PARAM: &str = "access_token";

// ============================================================================
// SECTION: Auth Material
// ============================================================================

/// Headers and query parameters derived from credentials.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthMaterial {
    /// Headers to merge into the request.
    pub headers: BTreeMap<String, String>,
    /// Query parameters appended to the request URL.
    pub query_params: BTreeMap<String, String>,
}

// ============================================================================
// SECTION: Auth Application
// ============================================================================

/// Builds authentication headers and query parameters.
#[must_use]
pub fn apply_auth(credentials: &Credentials, method: &AuthMethod) -> AuthMaterial {
    let mut material = AuthMaterial::default();
    match method {
        AuthMethod::BearerToken { header_name, prefix } => {
            if let Some(token) = credentials.get(TOKEN_FIELD) {
                material.headers.insert(header_name.clone(), format!("{prefix}{token}"));
            }
        }
        AuthMethod::ApiKey { placement, param_name, prefix } => {
            if let Some(key) = credentials.get(API_KEY_FIELD) {
                let value = format!("{prefix}{key}");
                match placement {
                    ApiKeyPlacement::Header => {
                        material.headers.insert(param_name.clone(), value);
                    }
                    ApiKeyPlacement::Query => {
                        material.query_params.insert(param_name.clone(), value);
                    }
                    ApiKeyPlacement::Body => {}
                }
            }
        }
        AuthMethod::BasicAuth { username_field, password_field } => {
            let username = credentials.get(username_field);
            let password = credentials.get(password_field);
            if username.is_some() || password.is_some() {
                let pair = format!("{}:{}", username.unwrap_or(""), password.unwrap_or(""));
                material
                    .headers
                    .insert("Authorization".to_string(), format!("Basic {}", STANDARD.encode(pair)));
            }
        }
        AuthMethod::OAuth2 { token_placement, token_prefix } => {
            if let Some(token) = credentials.get(ACCESS_TOKEN_FIELD) {
                match token_placement {
                    TokenPlacement::Header => {
                        material
                            .headers
                            .insert("Authorization".to_string(), format!("{token_prefix}{token}"));
                    }
                    TokenPlacement::Query => {
                        material
                            .query_params
                            .insert(ACCESS_TOKEN_QUERY_PARAM.to_string(), token.to_string());
                    }
                }
            }
        }
        AuthMethod::CustomHeader { headers } => {
            for spec in headers {
                let value = match &spec.source {
                    HeaderValueSource::Credential { credential_key, static_value } => credentials
                        .get(credential_key)
                        .map(str::to_string)
                        .or_else(|| static_value.clone()),
                    HeaderValueSource::Static { static_value } => Some(static_value.clone()),
                };
                if let Some(value) = value {
                    material.headers.insert(spec.name.clone(), value);
                }
            }
        }
        AuthMethod::None => {}
    }
    material
}

/// Returns fields the request builder injects into the body for body-placed keys.
#[must_use]
pub fn body_auth_fields(credentials: &Credentials, method: &AuthMethod) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    if let AuthMethod::ApiKey { placement: ApiKeyPlacement::Body, param_name, prefix } = method
        && let Some(key) = credentials.get(API_KEY_FIELD)
    {
        fields.insert(param_name.clone(), format!("{prefix}{key}"));
    }
    fields
}
