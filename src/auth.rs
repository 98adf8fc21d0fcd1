use std::collections::HashMap;

use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::{debug, error};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::srp::{PasswordVerifierChallenge, SrpClient};

pub const REGION: &str = "eu-central-1";
pub const USER_POOL_ID: &str = "eu-central-1_BYmQ2VBlo";
pub const CLIENT_ID: &str = "7sc1qltkqobo3ddqsk4542dg2h";

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";

/// Tokens issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub id_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl AuthTokens {
    /// Bearer token for API calls: the legacy API takes the access token,
    /// the current one the ID token.
    pub fn bearer(&self, legacy: bool) -> &str {
        if legacy {
            &self.access_token
        } else {
            &self.id_token
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'a str,
    client_id: &'a str,
    auth_parameters: HashMap<&'a str, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RespondToAuthChallengeRequest<'a> {
    challenge_name: &'a str,
    client_id: &'a str,
    challenge_responses: HashMap<&'a str, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CognitoResponse {
    challenge_name: Option<String>,
    #[serde(default)]
    challenge_parameters: HashMap<String, String>,
    authentication_result: Option<AuthenticationResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    id_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "__type")]
    kind: Option<String>,
    message: Option<String>,
}

/// JWT claims needed for the expiry check
#[derive(Debug, Deserialize)]
struct Claims {
    exp: u64,
}

/// Read the `exp` claim of a JWT without verifying its signature.
pub fn token_expiry(token: &str) -> Result<u64> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims.exp)
        .map_err(|e| Error::Auth(format!("Failed to decode token: {}", e)))
}

/// Whether `token` is expired or will be within `buffer_seconds`.
///
/// Tokens that cannot be decoded count as expired.
pub fn is_token_expired(token: &str, buffer_seconds: u64) -> bool {
    match token_expiry(token) {
        Ok(exp) => {
            let now = Utc::now().timestamp().max(0) as u64;
            now + buffer_seconds >= exp
        }
        Err(_) => true,
    }
}

/// Client for the Cognito user pool the stoves' accounts live in.
pub struct CognitoClient {
    client: reqwest::Client,
    endpoint: String,
    user_pool_id: String,
    client_id: String,
}

impl Default for CognitoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CognitoClient {
    pub fn new() -> Self {
        Self::with_http_client(
            reqwest::Client::new(),
            format!("https://cognito-idp.{}.amazonaws.com/", REGION),
        )
    }

    pub fn new_with_endpoint(endpoint: String) -> Self {
        Self::with_http_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_http_client(client: reqwest::Client, endpoint: String) -> Self {
        Self {
            client,
            endpoint,
            user_pool_id: USER_POOL_ID.to_string(),
            client_id: CLIENT_ID.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: Serialize>(&self, target: &str, body: &T) -> Result<CognitoResponse> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(AMZ_JSON));
        headers.insert(
            "x-amz-target",
            HeaderValue::from_str(&format!("{}.{}", TARGET_PREFIX, target))
                .map_err(|e| Error::Other(e.to_string()))?,
        );

        let response = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if status.is_success() {
            Ok(serde_json::from_str(&response_text)?)
        } else {
            let message = match serde_json::from_str::<ErrorResponse>(&response_text) {
                Ok(ErrorResponse {
                    kind: Some(kind),
                    message: Some(message),
                }) => format!("{}: {}", kind, message),
                Ok(ErrorResponse {
                    message: Some(message),
                    ..
                }) => message,
                _ => response_text,
            };
            error!("{} failed with status {}: {}", target, status, message);
            Err(Error::Auth(message))
        }
    }

    /// Sign in with the SRP password verifier flow.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<AuthTokens> {
        debug!("Signing in user: {}", username);
        let srp = SrpClient::new(&self.user_pool_id)?;

        let initiate = InitiateAuthRequest {
            auth_flow: "USER_SRP_AUTH",
            client_id: &self.client_id,
            auth_parameters: HashMap::from([
                ("USERNAME", username.to_string()),
                ("SRP_A", srp.srp_a()),
            ]),
        };
        let response = self.call("InitiateAuth", &initiate).await?;

        match response.challenge_name.as_deref() {
            Some("PASSWORD_VERIFIER") => {}
            Some(other) => {
                return Err(Error::Auth(format!("Unsupported challenge: {}", other)));
            }
            None => return Err(Error::Auth("Missing PASSWORD_VERIFIER challenge".to_string())),
        }

        let params = &response.challenge_parameters;
        let param = |name: &str| {
            params
                .get(name)
                .cloned()
                .ok_or_else(|| Error::Auth(format!("Missing challenge parameter: {}", name)))
        };
        let challenge = PasswordVerifierChallenge {
            salt: param("SALT")?,
            secret_block: param("SECRET_BLOCK")?,
            srp_b: param("SRP_B")?,
            user_id_for_srp: param("USER_ID_FOR_SRP").or_else(|_| param("USERNAME"))?,
        };
        let claim = srp.process_challenge(&challenge, password, Utc::now())?;

        let respond = RespondToAuthChallengeRequest {
            challenge_name: "PASSWORD_VERIFIER",
            client_id: &self.client_id,
            challenge_responses: HashMap::from([
                ("TIMESTAMP", claim.timestamp),
                ("USERNAME", claim.username),
                ("PASSWORD_CLAIM_SECRET_BLOCK", claim.secret_block),
                ("PASSWORD_CLAIM_SIGNATURE", claim.signature),
            ]),
        };
        let response = self.call("RespondToAuthChallenge", &respond).await?;
        let tokens = Self::tokens_from(response, None)?;

        debug!("Sign in successful for user: {}", username);
        Ok(tokens)
    }

    /// Trade a refresh token for fresh access and ID tokens.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens> {
        debug!("Refreshing tokens");
        let request = InitiateAuthRequest {
            auth_flow: "REFRESH_TOKEN_AUTH",
            client_id: &self.client_id,
            auth_parameters: HashMap::from([("REFRESH_TOKEN", refresh_token.to_string())]),
        };
        let response = self.call("InitiateAuth", &request).await?;
        Self::tokens_from(response, Some(refresh_token))
    }

    fn tokens_from(response: CognitoResponse, refresh_token: Option<&str>) -> Result<AuthTokens> {
        let result = response.authentication_result.ok_or_else(|| {
            Error::Auth(format!(
                "No authentication result (challenge: {})",
                response.challenge_name.as_deref().unwrap_or("none")
            ))
        })?;
        let id_token = result
            .id_token
            .ok_or_else(|| Error::Auth("Missing IdToken in authentication result".to_string()))?;

        Ok(AuthTokens {
            access_token: result.access_token,
            id_token,
            refresh_token: result
                .refresh_token
                .or_else(|| refresh_token.map(str::to_string)),
        })
    }
}
