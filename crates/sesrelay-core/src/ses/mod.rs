//! Amazon SES send capability
//!
//! Talks to the SES v1 Query API (`Action=SendRawEmail`) over HTTPS.
//! See: https://docs.aws.amazon.com/ses/latest/APIReference/API_SendRawEmail.html

pub mod sigv4;

use crate::transport::{EmailTransport, SendOutcome, SendRawEmailRequest};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use sesrelay_common::config::{Credentials, SesConfig};
use sesrelay_common::{Error, TransportError};
use std::time::Duration;
use tracing::{debug, info, warn};

use self::sigv4::{SigningParams, FORM_CONTENT_TYPE};

const API_VERSION: &str = "2010-12-01";
const SERVICE: &str = "ses";

/// SES HTTP client
pub struct SesClient {
    client: Client,
    endpoint: Url,
    region: String,
    credentials: Credentials,
}

impl std::fmt::Debug for SesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SesClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("region", &self.region)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl SesClient {
    /// Create a new SES client
    pub fn new(config: &SesConfig) -> sesrelay_common::Result<Self> {
        let credentials = config.credentials()?;

        let endpoint = Url::parse(&config.endpoint_url())
            .map_err(|e| Error::Config(format!("Invalid SES endpoint: {}", e)))?;
        if endpoint.host_str().is_none() {
            return Err(Error::Config(format!(
                "SES endpoint has no host: {}",
                endpoint
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            endpoint = %endpoint,
            region = %config.region,
            "SES client initialized"
        );

        Ok(Self {
            client,
            endpoint,
            region: config.region.clone(),
            credentials,
        })
    }

    /// Host header value the request is signed for
    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}

#[async_trait]
impl EmailTransport for SesClient {
    async fn send_raw_email(
        &self,
        request: SendRawEmailRequest,
    ) -> Result<SendOutcome, TransportError> {
        let body = encode_request(&request);
        let signed = sigv4::sign_form_post(
            &SigningParams {
                credentials: &self.credentials,
                region: &self.region,
                service: SERVICE,
                time: Utc::now(),
            },
            &self.host(),
            self.endpoint.path(),
            &body,
        )?;

        debug!(
            endpoint = %self.endpoint,
            destinations = request.destinations.len(),
            size = request.raw_message.len(),
            "Sending SendRawEmail request"
        );

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header("X-Amz-Date", &signed.amz_date)
            .header(AUTHORIZATION, &signed.authorization);
        if let Some(token) = &self.credentials.session_token {
            builder = builder.header("X-Amz-Security-Token", token);
        }

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !status.is_success() {
            let error = parse_error(status.as_u16(), &text);
            warn!(status = status.as_u16(), error = %error, "SES rejected request");
            return Err(error);
        }

        if !text.contains("<SendRawEmailResponse") {
            return Err(TransportError::InvalidResponse(
                "missing SendRawEmailResponse element".to_string(),
            ));
        }

        let message_id = extract_tag(&text, "MessageId").map(unescape_xml);
        debug!(message_id = ?message_id, "SES accepted message");

        Ok(SendOutcome { message_id })
    }

    fn name(&self) -> &str {
        "ses"
    }
}

/// Encode a request as SES Query API form parameters
pub fn encode_request(request: &SendRawEmailRequest) -> String {
    let mut params: Vec<(String, String)> = vec![
        ("Action".to_string(), "SendRawEmail".to_string()),
        ("Version".to_string(), API_VERSION.to_string()),
        (
            "RawMessage.Data".to_string(),
            STANDARD.encode(&request.raw_message),
        ),
    ];

    if let Some(source) = &request.source {
        params.push(("Source".to_string(), source.clone()));
    }
    for (i, destination) in request.destinations.iter().enumerate() {
        params.push((format!("Destinations.member.{}", i + 1), destination.clone()));
    }
    if let Some(set) = &request.configuration_set {
        params.push(("ConfigurationSetName".to_string(), set.clone()));
    }

    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode everything except RFC 3986 unreserved characters
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Map an SES error document to a transport error
fn parse_error(status: u16, body: &str) -> TransportError {
    TransportError::Api {
        status,
        code: extract_tag(body, "Code")
            .map(unescape_xml)
            .unwrap_or_else(|| "Unknown".to_string()),
        message: extract_tag(body, "Message")
            .map(unescape_xml)
            .unwrap_or_else(|| body.trim().chars().take(200).collect()),
    }
}

/// Text of the first `<tag>` element. SES responses are flat and carry no
/// attributes on the elements read here.
fn extract_tag<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(xml[start..end].trim())
}

/// Decode the predefined entities and numeric character references in one
/// pass. Unrecognized references are kept verbatim.
fn unescape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest
            .find(';')
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let code = entity.strip_prefix('#')?;
            let code = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
