use crate::PayloadError;
use std::collections::HashSet;
use url::Url;

/// Parses an endpoint base URL, rejecting anything that is not HTTP(S)
pub fn parse_endpoint(endpoint: &str) -> Result<Url, PayloadError> {
    let url = Url::parse(endpoint).map_err(|e| PayloadError::InvalidEndpoint {
        url: endpoint.to_string(),
        message: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(PayloadError::InvalidEndpoint {
            url: endpoint.to_string(),
            message: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    if url.host_str().is_none() {
        return Err(PayloadError::InvalidEndpoint {
            url: endpoint.to_string(),
            message: "missing host".to_string(),
        });
    }

    Ok(url)
}

/// Builds the query URL for one slot: `<base>?slot=<slot>`
///
/// # Examples
///
/// ```
/// use relay_payloads::catalog::slot_query_url;
/// use url::Url;
///
/// let base = Url::parse("https://relay.example.com/proposer_payload_delivered").unwrap();
/// assert_eq!(
///     slot_query_url(&base, 42).as_str(),
///     "https://relay.example.com/proposer_payload_delivered?slot=42"
/// );
/// ```
pub fn slot_query_url(base: &Url, slot: u64) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair("slot", &slot.to_string());
    url
}

/// Builds the URL returning a relay's most recent delivered payloads
///
/// The relay API answers a query without a `slot` parameter with its latest
/// deliveries, so this is the base URL unchanged.
pub fn latest_url(base: &Url) -> Url {
    base.clone()
}

/// Resolves every distinct endpoint host once through DNS
///
/// A catalog whose hosts cannot be resolved is a setup problem: the whole run
/// would degrade to null records, so it is reported before dispatch instead.
pub async fn resolve_endpoints(endpoints: &[Url]) -> Result<(), PayloadError> {
    let mut seen = HashSet::new();

    for url in endpoints {
        let host = match url.host_str() {
            Some(h) => h.to_string(),
            None => continue,
        };
        let port = url.port_or_known_default().unwrap_or(443);
        let target = format!("{}:{}", host, port);

        if !seen.insert(target.clone()) {
            continue;
        }

        tracing::debug!("Resolving endpoint host {}", target);
        let mut addrs = tokio::net::lookup_host(target.as_str())
            .await
            .map_err(|e| PayloadError::EndpointResolution {
                host: host.clone(),
                message: e.to_string(),
            })?;

        if addrs.next().is_none() {
            return Err(PayloadError::EndpointResolution {
                host,
                message: "no addresses returned".to_string(),
            });
        }
    }

    Ok(())
}
