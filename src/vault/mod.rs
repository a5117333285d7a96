//! Vault SSH secrets engine client.
//!
//! Only the verify endpoint is used: `PUT /v1/<mount>/verify` with the OTP in the
//! body. Redirects (e.g. from a standby node) are followed manually, at most
//! once, and never from `https` to `http`.

pub mod tls;

use reqwest::{
    Client, Method, StatusCode,
    cookie::{CookieStore, Jar},
    header::LOCATION,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use std::{future::Future, path::PathBuf, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{Instrument, debug, info_span};
use url::Url;

const VAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const VAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid Vault address: {0}")]
    Url(String),
    #[error("failed to load CA certificates: {0}")]
    Tls(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{url} - {status}, {message}")]
    Status {
        url: String,
        status: StatusCode,
        message: String,
    },
    #[error("redirect from {from} would cause protocol downgrade to {to}")]
    ProtocolDowngrade { from: String, to: String },
    #[error("invalid redirect from {url}: {reason}")]
    Redirect { url: String, reason: String },
    #[error("Error parsing JSON response: no data found")]
    MissingData,
}

/// Fields of the verify response. Echo requests only set `message`; real OTPs
/// set `username`, `ip` and, on newer Vault versions, `role_name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub role_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecretEnvelope {
    #[serde(default)]
    data: Option<VerifyResponse>,
}

/// Sends verify requests to the remote secret service.
pub trait RemoteVerifier {
    /// # Errors
    /// Returns an error if the request fails, the service answers with a
    /// non-success status, or the response cannot be decoded.
    fn send_verify(
        &self,
        otp: &str,
        mount_point: &str,
    ) -> impl Future<Output = Result<VerifyResponse, VaultError>> + Send;
}

/// Connection settings for [`VaultClient`].
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    pub address: String,
    pub namespace: Option<String>,
    pub token: Option<SecretString>,
    pub ca_cert: Option<PathBuf>,
    pub ca_path: Option<PathBuf>,
    pub tls_skip_verify: bool,
}

#[derive(Clone)]
pub struct VaultClient {
    client: Client,
    jar: Arc<Jar>,
    address: String,
    namespace: Option<String>,
    token: Option<SecretString>,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("address", &self.address)
            .field("namespace", &self.namespace)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

fn vault_error_message(json_response: &Value) -> &str {
    json_response
        .get("errors")
        .and_then(|v| v.get(0))
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// Build `scheme://host:port<path>` from the Vault address, dropping any path
/// the address carries.
///
/// # Errors
/// Returns an error if `url` cannot be parsed, has no host, or uses an unsupported scheme.
pub fn endpoint_url(url: &str, path: &str) -> Result<Url, VaultError> {
    let url = Url::parse(url).map_err(|e| VaultError::Url(e.to_string()))?;

    let scheme = url.scheme();

    let host = url
        .host()
        .ok_or_else(|| VaultError::Url("no host specified".to_string()))?
        .to_owned();

    let port = match url.port() {
        Some(p) => p,
        None => match scheme {
            "http" => 80,
            "https" => 443,
            _ => return Err(VaultError::Url(format!("unsupported scheme {scheme}"))),
        },
    };

    let endpoint_url = format!("{scheme}://{host}:{port}{path}");

    debug!("endpoint URL: {}", endpoint_url);

    Url::parse(&endpoint_url).map_err(|e| VaultError::Url(e.to_string()))
}

/// Path of the verify endpoint for a mount point.
#[must_use]
pub fn verify_path(mount_point: &str) -> String {
    format!("/v1/{}/verify", mount_point.trim_matches('/'))
}

/// Reject redirects that would leave TLS.
///
/// # Errors
/// Returns [`VaultError::ProtocolDowngrade`] for an `https` to non-`https` hop.
pub fn check_redirect(from: &Url, to: &Url) -> Result<(), VaultError> {
    if from.scheme() == "https" && to.scheme() != "https" {
        return Err(VaultError::ProtocolDowngrade {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    Ok(())
}

impl VaultClient {
    /// Build the HTTP client: TLS 1.2+, custom CA material, no automatic redirects
    /// and a cookie jar shared across the single allowed redirect.
    ///
    /// # Errors
    /// Returns an error if the CA material cannot be loaded or the client cannot be built.
    pub fn new(user_agent: &str, settings: ClientSettings) -> Result<Self, VaultError> {
        // Fail early on a bad address instead of at request time
        endpoint_url(&settings.address, "/")?;

        let jar = Arc::new(Jar::default());

        let mut builder = Client::builder()
            .user_agent(user_agent)
            .cookie_provider(jar.clone())
            .redirect(reqwest::redirect::Policy::none())
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .connect_timeout(VAULT_CONNECT_TIMEOUT)
            .timeout(VAULT_REQUEST_TIMEOUT);

        let certificates = if let Some(path) = &settings.ca_cert {
            tls::load_ca_cert(path)?
        } else if let Some(path) = &settings.ca_path {
            tls::load_ca_path(path)?
        } else {
            Vec::new()
        };

        for certificate in certificates {
            builder = builder.add_root_certificate(certificate);
        }

        if settings.tls_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            client: builder.build()?,
            jar,
            address: settings.address,
            namespace: settings.namespace.filter(|ns| !ns.trim().is_empty()),
            token: settings.token,
        })
    }

    fn request(&self, url: &Url, payload: &Value) -> reqwest::RequestBuilder {
        let mut request = self.client.request(Method::PUT, url.clone()).json(payload);

        if let Some(token) = &self.token {
            request = request.header("X-Vault-Token", token.expose_secret());
        }

        if let Some(namespace) = &self.namespace {
            request = request.header("X-Vault-Namespace", namespace);
        }

        request
    }

    // Session cookies set for the original URL must follow the request
    fn carry_cookies(&self, from: &Url, to: &Url) {
        let Some(header) = self.jar.cookies(from) else {
            return;
        };
        let Ok(cookies) = header.to_str() else {
            return;
        };

        let present = self.jar.cookies(to);
        let present = present.as_ref().and_then(|v| v.to_str().ok());

        for cookie in missing_cookies(cookies, present) {
            self.jar.add_cookie_str(cookie, to);
        }
    }

    fn redirect_target(url: &Url, response: &reqwest::Response) -> Result<Url, VaultError> {
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| VaultError::Redirect {
                url: url.to_string(),
                reason: "missing Location header".to_string(),
            })?;

        url.join(location).map_err(|e| VaultError::Redirect {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Cookies from the `from` header whose name is not already in the `to` header.
fn missing_cookies<'a>(from: &'a str, to: Option<&str>) -> Vec<&'a str> {
    let name = |cookie: &str| cookie.split('=').next().unwrap_or_default().trim().to_string();
    let present: Vec<String> = to
        .map(|header| header.split(';').map(name).collect())
        .unwrap_or_default();

    from.split(';')
        .map(str::trim)
        .filter(|cookie| !cookie.is_empty() && !present.contains(&name(*cookie)))
        .collect()
}

impl RemoteVerifier for VaultClient {
    async fn send_verify(&self, otp: &str, mount_point: &str) -> Result<VerifyResponse, VaultError> {
        let mut url = endpoint_url(&self.address, &verify_path(mount_point))?;
        let payload = json!({ "otp": otp });
        let mut redirected = false;

        loop {
            let span = info_span!(
                "vault.verify",
                http.method = "PUT",
                url = %url
            );
            let response = self.request(&url, &payload).send().instrument(span).await?;

            let status = response.status();

            if matches!(status, StatusCode::FOUND | StatusCode::TEMPORARY_REDIRECT) && !redirected {
                let target = Self::redirect_target(&url, &response)?;
                check_redirect(&url, &target)?;

                debug!("following redirect to {}", target);

                self.carry_cookies(&url, &target);
                url = target;
                redirected = true;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_else(|e| {
                    debug!("failed to read error body from {}: {}", url, e);
                    String::new()
                });
                let json_response: Value = serde_json::from_str(&body).unwrap_or_default();

                return Err(VaultError::Status {
                    url: url.to_string(),
                    status,
                    message: vault_error_message(&json_response).to_string(),
                });
            }

            let envelope: SecretEnvelope = response.json().await?;

            return envelope.data.ok_or(VaultError::MissingData);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_cookies_skips_names_already_sent() {
        assert_eq!(
            missing_cookies("session=abc; lb=node1", Some("session=abc")),
            vec!["lb=node1"]
        );
        assert!(missing_cookies("session=abc", Some("session=abc")).is_empty());
        assert_eq!(missing_cookies("session=abc", None), vec!["session=abc"]);
    }

    #[test]
    fn carried_cookie_is_not_duplicated() {
        let client = VaultClient::new(
            "test",
            ClientSettings {
                address: "http://127.0.0.1:8200".to_string(),
                ..ClientSettings::default()
            },
        )
        .unwrap();
        let from = Url::parse("http://127.0.0.1:8200/v1/ssh/verify").unwrap();
        let to = Url::parse("http://127.0.0.1:8200/v1/ssh-active/verify").unwrap();
        client.jar.add_cookie_str("session=abc; Path=/", &from);

        client.carry_cookies(&from, &to);

        let header = client.jar.cookies(&to).unwrap();
        assert_eq!(header.to_str().unwrap(), "session=abc");
    }

    #[test]
    fn cookie_is_carried_to_another_host() {
        let client = VaultClient::new(
            "test",
            ClientSettings {
                address: "http://127.0.0.1:8200".to_string(),
                ..ClientSettings::default()
            },
        )
        .unwrap();
        let from = Url::parse("http://127.0.0.1:8200/v1/ssh/verify").unwrap();
        let to = Url::parse("http://10.0.0.2:8200/v1/ssh/verify").unwrap();
        client.jar.add_cookie_str("session=abc", &from);
        assert!(client.jar.cookies(&to).is_none());

        client.carry_cookies(&from, &to);

        let header = client.jar.cookies(&to).unwrap();
        assert_eq!(header.to_str().unwrap(), "session=abc");
    }

    #[test]
    fn endpoint_url_defaults_http_port() {
        let url = endpoint_url("http://example.com", "/v1/test").unwrap();
        assert_eq!(url.as_str(), "http://example.com/v1/test");
        assert_eq!(url.port_or_known_default(), Some(80));
    }

    #[test]
    fn endpoint_url_keeps_explicit_port_and_drops_path() {
        let url = endpoint_url("https://vault.tld:8200/ui/", "/v1/ssh/verify").unwrap();
        assert_eq!(url.as_str(), "https://vault.tld:8200/v1/ssh/verify");
    }

    #[test]
    fn endpoint_url_rejects_unsupported_scheme() {
        let err = endpoint_url("ftp://example.com", "/v1/test").unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn endpoint_url_rejects_garbage() {
        assert!(matches!(
            endpoint_url("not a url", "/"),
            Err(VaultError::Url(_))
        ));
    }

    #[test]
    fn verify_path_trims_slashes() {
        assert_eq!(verify_path("ssh"), "/v1/ssh/verify");
        assert_eq!(verify_path("/team/ssh/"), "/v1/team/ssh/verify");
    }

    #[test]
    fn check_redirect_rejects_downgrade() {
        let https = Url::parse("https://vault.tld:8200/v1/ssh/verify").unwrap();
        let http = Url::parse("http://vault.tld:8200/v1/ssh/verify").unwrap();

        assert!(check_redirect(&https, &https).is_ok());
        assert!(check_redirect(&http, &https).is_ok());
        assert!(check_redirect(&http, &http).is_ok());
        assert!(matches!(
            check_redirect(&https, &http),
            Err(VaultError::ProtocolDowngrade { .. })
        ));
    }

    #[test]
    fn vault_error_message_reads_first_error() {
        let body = json!({"errors": ["OTP not found", "other"]});
        assert_eq!(vault_error_message(&body), "OTP not found");
        assert_eq!(vault_error_message(&json!({})), "");
    }

    #[test]
    fn verify_response_decodes_partial_data() {
        let echo: SecretEnvelope =
            serde_json::from_value(json!({"data": {"message": "verify-echo-response"}})).unwrap();
        assert_eq!(
            echo.data.unwrap().message.as_deref(),
            Some("verify-echo-response")
        );

        let otp: SecretEnvelope = serde_json::from_value(json!({
            "lease_id": "",
            "data": {"username": "ubuntu", "ip": "10.0.0.1", "role_name": "ops"}
        }))
        .unwrap();
        let data = otp.data.unwrap();
        assert_eq!(data.username.as_deref(), Some("ubuntu"));
        assert_eq!(data.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(data.role_name.as_deref(), Some("ops"));
        assert!(data.message.is_none());

        let empty: SecretEnvelope = serde_json::from_value(json!({"data": null})).unwrap();
        assert!(empty.data.is_none());
    }

    #[test]
    fn client_rejects_bad_address() {
        let settings = ClientSettings {
            address: "vault.tld:8200".to_string(),
            ..ClientSettings::default()
        };
        assert!(VaultClient::new("test", settings).is_err());
    }

    #[test]
    fn client_debug_hides_token() {
        let settings = ClientSettings {
            address: "https://vault.tld:8200".to_string(),
            token: Some(SecretString::from("s.supersecret".to_string())),
            ..ClientSettings::default()
        };
        let client = VaultClient::new("test", settings).unwrap();
        assert!(!format!("{client:?}").contains("supersecret"));
    }
}
