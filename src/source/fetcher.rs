//! Remote PDF download with scheme, content-type and size checks

use crate::config::Settings;
use crate::error::{Error, Result};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use std::net::{IpAddr, Ipv4Addr};
use url::{Host, Url};

/// Filename reported when the URL path has no usable last segment
pub const DEFAULT_REMOTE_FILENAME: &str = "remote.pdf";

/// Predicate deciding whether a resolved address may be contacted
type AddressGuard = fn(&IpAddr) -> bool;

/// HTTP client for downloading PDFs
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    max_bytes: u64,
    max_redirects: usize,
    /// Set when private addresses are blocked; returns true for a blocked address
    guard: Option<AddressGuard>,
}

impl Fetcher {
    /// Build a fetcher from the service settings
    pub fn new(settings: &Settings) -> Result<Self> {
        let guard: Option<AddressGuard> = settings
            .block_private_urls
            .then_some(is_private_ip as AddressGuard);

        // Guarded fetches follow redirects by hand so every hop is checked
        let redirect = if guard.is_some() {
            reqwest::redirect::Policy::none()
        } else {
            reqwest::redirect::Policy::limited(settings.fetch_max_redirects)
        };

        let client = reqwest::Client::builder()
            .connect_timeout(settings.fetch_connect_timeout)
            .timeout(settings.fetch_timeout)
            .redirect(redirect)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Internal {
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            max_bytes: settings.max_file_bytes(),
            max_redirects: settings.fetch_max_redirects,
            guard,
        })
    }

    /// Download a PDF.
    ///
    /// The scheme is validated before any network I/O. The size limit is
    /// enforced against `Content-Length` when present and again while the
    /// body is streamed.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let url = parse_url(url)?;

        let response = match self.guard {
            Some(blocked) => self.send_guarded(url.clone(), blocked).await?,
            None => self.client.get(url.clone()).send().await?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !looks_like_pdf(&content_type, &url) {
            return Err(Error::NotPdfContentType { content_type });
        }

        // Check Content-Length header for early rejection
        if let Some(content_length) = response.content_length() {
            if content_length > self.max_bytes {
                return Err(Error::TooLarge {
                    size: content_length,
                    max_size: self.max_bytes,
                });
            }
        }

        // Stream the response body with incremental size checking
        let mut data = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            data.extend_from_slice(&chunk);
            if data.len() as u64 > self.max_bytes {
                return Err(Error::TooLarge {
                    size: data.len() as u64,
                    max_size: self.max_bytes,
                });
            }
        }

        tracing::debug!(url = %url, bytes = data.len(), "downloaded remote PDF");

        Ok(data)
    }

    /// Send the request, checking the target address of the first request
    /// and of every redirect hop
    async fn send_guarded(
        &self,
        mut url: Url,
        blocked: AddressGuard,
    ) -> Result<reqwest::Response> {
        for _ in 0..=self.max_redirects {
            check_address(&url, blocked).await?;

            let response = self.client.get(url.clone()).send().await?;
            if !response.status().is_redirection() {
                return Ok(response);
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let Some(location) = location else {
                return Ok(response);
            };

            let next = url.join(&location).map_err(|e| Error::InvalidUrl {
                reason: format!("bad redirect location {:?}: {}", location, e),
            })?;
            url = match next.scheme() {
                "http" | "https" => next,
                other => {
                    return Err(Error::InvalidUrlScheme {
                        scheme: other.to_string(),
                    })
                }
            };
            tracing::debug!(to = %url, "following redirect");
        }

        Err(Error::Network {
            reason: format!("too many redirects (max {})", self.max_redirects),
        })
    }
}

/// Parse a URL and require an http or https scheme
pub fn parse_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim()).map_err(|e| Error::InvalidUrl {
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(Error::InvalidUrlScheme {
            scheme: other.to_string(),
        }),
    }
}

/// Derive a filename from the last path segment of a URL
pub fn filename_from_url(url: &str) -> String {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|segment| !segment.is_empty())
        .unwrap_or_else(|| DEFAULT_REMOTE_FILENAME.to_string())
}

/// A response is accepted when its content type mentions "pdf" or the URL
/// path ends in ".pdf"
fn looks_like_pdf(content_type: &str, url: &Url) -> bool {
    content_type.to_ascii_lowercase().contains("pdf")
        || url.path().to_ascii_lowercase().ends_with(".pdf")
}

/// Addresses a guarded fetch refuses to contact. IPv4-mapped IPv6
/// addresses are judged by their IPv4 form.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_private_v4(&v4),
            None => {
                let head = v6.segments()[0];
                v6.is_loopback()
                    || v6.is_unspecified()
                    || head & 0xFE00 == 0xFC00 // unique local fc00::/7
                    || head & 0xFFC0 == 0xFE80 // link-local fe80::/10
            }
        },
    }
}

fn is_private_v4(ip: &Ipv4Addr) -> bool {
    let [first, second, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || first == 0
        || (first == 100 && (64..128).contains(&second)) // CGNAT 100.64/10
}

/// Resolve the URL host and fail with `BlockedUrl` if any address is blocked.
/// IP literals are checked as-is without a DNS lookup.
async fn check_address(url: &Url, blocked: AddressGuard) -> Result<()> {
    let addrs: Vec<IpAddr> = match url.host() {
        Some(Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
        Some(Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
        Some(Host::Domain(domain)) => {
            let port = url.port_or_known_default().unwrap_or(80);
            tokio::net::lookup_host((domain, port))
                .await
                .map_err(|e| Error::Network {
                    reason: format!("DNS resolution failed for {}: {}", domain, e),
                })?
                .map(|addr| addr.ip())
                .collect()
        }
        None => {
            return Err(Error::InvalidUrl {
                reason: "URL has no host".to_string(),
            })
        }
    };

    if addrs.iter().any(|ip| blocked(ip)) {
        return Err(Error::BlockedUrl {
            url: url.to_string(),
        });
    }

    Ok(())
}
