use serde::{Deserialize, Serialize};

/// Query string of `GET /configs`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigQuery<'a> {
    pub data_id: &'a str,
    pub group: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<&'a str>,
}

/// Form body of `POST /configs`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishForm<'a> {
    pub data_id: &'a str,
    pub group: &'a str,
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<&'a str>,
}

/// Body of a successful `POST /auth/login`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub token_ttl: Option<u64>,
}
