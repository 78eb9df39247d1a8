//! AWS Signature Version 4 for form-encoded POST requests
//!
//! See: https://docs.aws.amazon.com/IAM/latest/UserGuide/create-signed-request.html

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sesrelay_common::config::Credentials;
use sesrelay_common::TransportError;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Inputs for signing a single request
pub struct SigningParams<'a> {
    pub credentials: &'a Credentials,
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
}

/// Headers to attach to a signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
}

/// Sign a `POST` of a form-encoded `body` to `host` + `path`
pub fn sign_form_post(
    params: &SigningParams<'_>,
    host: &str,
    path: &str,
    body: &str,
) -> Result<SignedHeaders, TransportError> {
    let amz_date = params.time.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = params.time.format("%Y%m%d").to_string();

    let mut headers = vec![
        ("content-type", FORM_CONTENT_TYPE.to_string()),
        ("host", host.to_string()),
        ("x-amz-date", amz_date.clone()),
    ];
    if let Some(token) = &params.credentials.session_token {
        headers.push(("x-amz-security-token", token.clone()));
    }

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "POST\n{}\n\n{}\n{}\n{}",
        path,
        canonical_headers,
        signed_headers,
        sha256_hex(body.as_bytes())
    );

    let scope = format!(
        "{}/{}/{}/aws4_request",
        date_stamp, params.region, params.service
    );
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(
        &params.credentials.secret_access_key,
        &date_stamp,
        params.region,
        params.service,
    )?;
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

    Ok(SignedHeaders {
        authorization: format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, params.credentials.access_key_id, scope, signed_headers, signature
        ),
        amz_date,
    })
}

/// Derive the request signing key for a date, region and service
pub fn signing_key(
    secret: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, TransportError> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| TransportError::Signing(format!("Invalid HMAC key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
