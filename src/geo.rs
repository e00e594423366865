//! # Geolocation Resolver Module
//!
//! One-shot coarse geolocation via the public address of the link.
//!
//! The query asks the provider for exactly the two fields the payload needs
//! (latitude and longitude) in compact comma-separated form, keeping the
//! bytes to parse minimal. Resolution happens once, before the main loop;
//! the result is cached in the publisher for every subsequent record.

use tracing::debug;

use crate::error::{AgentError, Result};
use crate::http::{HttpClient, TcpTransport};
use crate::link::LinkDriver;

/// Maximum width of one coordinate field, e.g. `-123.4567`.
pub const GEO_FIELD_MAX: usize = 10;

/// Response buffer capacity: two fields and a separator, with slack for a
/// trailing newline some providers append.
const GEO_RESPONSE_MAX: usize = 2 * GEO_FIELD_MAX + 4;

/// Query path requesting only latitude and longitude, CSV-formatted.
const GEO_QUERY_PATH: &str = "/csv/?fields=lat,lon";

/// A cached coordinate pair. Decimal strings, never re-parsed as floats —
/// they go straight into the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoCoordinate {
    pub lat: String,
    pub lon: String,
}

/// Resolves the device's coarse position through the configured provider.
pub struct GeoResolver {
    provider_host: String,
}

impl GeoResolver {
    pub fn new(provider_host: impl Into<String>) -> Self {
        Self { provider_host: provider_host.into() }
    }

    /// Fetch and parse the coordinate pair.
    ///
    /// HTTP failures propagate typed ([`AgentError::Http`]); a body that is
    /// not literally `<lat>,<lon>` is [`AgentError::GeoParse`]. The caller
    /// decides whether either is fatal.
    pub async fn resolve<L, T>(
        &self,
        link: &mut L,
        http: &mut HttpClient<T>,
    ) -> Result<GeoCoordinate>
    where
        L: LinkDriver,
        T: TcpTransport,
    {
        let response = http
            .get(link, &self.provider_host, GEO_QUERY_PATH, GEO_RESPONSE_MAX)
            .await?;
        debug!(bytes = response.body.len(), "geolocation response received");
        parse_coordinates(&response.body)
    }
}

/// Parse a body of the literal shape `<lat>,<lon>` into bounded fields.
///
/// The separating comma is discarded. A missing separator, an empty field,
/// a field wider than [`GEO_FIELD_MAX`], or trailing extra fields all fail.
fn parse_coordinates(body: &[u8]) -> Result<GeoCoordinate> {
    let text = std::str::from_utf8(body)
        .map_err(|_| AgentError::GeoParse("response is not UTF-8".into()))?
        .trim_end();

    let (lat, lon) = text
        .split_once(',')
        .ok_or_else(|| AgentError::GeoParse(format!("no separator in {text:?}")))?;

    if lon.contains(',') {
        return Err(AgentError::GeoParse(format!("trailing fields in {text:?}")));
    }
    for field in [lat, lon] {
        if field.is_empty() {
            return Err(AgentError::GeoParse(format!("empty field in {text:?}")));
        }
        if field.len() > GEO_FIELD_MAX {
            return Err(AgentError::GeoParse(format!(
                "field {field:?} exceeds {GEO_FIELD_MAX} characters"
            )));
        }
    }

    Ok(GeoCoordinate { lat: lat.to_string(), lon: lon.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::transport::mocks::MockTransport;
    use crate::link::driver::mocks::MockLink;

    #[test]
    fn test_parse_reference_body() {
        let geo = parse_coordinates(b"12.3456,-98.7654").unwrap();
        assert_eq!(geo.lat, "12.3456");
        assert_eq!(geo.lon, "-98.7654");
    }

    #[test]
    fn test_parse_tolerates_trailing_newline() {
        let geo = parse_coordinates(b"51.5,-0.12\n").unwrap();
        assert_eq!(geo.lat, "51.5");
        assert_eq!(geo.lon, "-0.12");
    }

    #[test]
    fn test_parse_missing_separator() {
        let err = parse_coordinates(b"12.3456 -98.7654").unwrap_err();
        assert!(matches!(err, AgentError::GeoParse(_)));
    }

    #[test]
    fn test_parse_empty_fields() {
        assert!(parse_coordinates(b",-98.7654").is_err());
        assert!(parse_coordinates(b"12.3456,").is_err());
        assert!(parse_coordinates(b",").is_err());
    }

    #[test]
    fn test_parse_field_too_wide() {
        let err = parse_coordinates(b"12.34567890123,-98.7654").unwrap_err();
        assert!(matches!(err, AgentError::GeoParse(_)));
    }

    #[test]
    fn test_parse_rejects_extra_fields() {
        let err = parse_coordinates(b"12.3,-98.7,250").unwrap_err();
        assert!(matches!(err, AgentError::GeoParse(_)));
    }

    #[test]
    fn test_parse_not_utf8() {
        let err = parse_coordinates(&[0xFF, 0xFE, b',']).unwrap_err();
        assert!(matches!(err, AgentError::GeoParse(_)));
    }

    #[tokio::test]
    async fn test_resolve_end_to_end() {
        let body = "12.3456,-98.7654";
        let transport = MockTransport::with_response(vec![format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()]);
        let mut http = HttpClient::new(transport, 100);
        let mut link = MockLink::healthy();

        let resolver = GeoResolver::new("geo.example.com");
        let geo = resolver.resolve(&mut link, &mut http).await.unwrap();
        assert_eq!(geo, GeoCoordinate { lat: "12.3456".into(), lon: "-98.7654".into() });
    }

    #[tokio::test]
    async fn test_resolve_propagates_http_errors() {
        let transport =
            MockTransport::with_response(vec![b"HTTP/1.1 404 Not Found\r\n".to_vec()]);
        let mut http = HttpClient::new(transport, 100);
        let mut link = MockLink::healthy();

        let err = GeoResolver::new("geo.example.com")
            .resolve(&mut link, &mut http)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Http(crate::http::HttpError::Status(404))));
    }
}
