//! VLESS connection descriptor parsing.
//!
//! A descriptor string has the shape
//! `vless://uuid@host:port/?type=tcp&security=reality&...#tag` and decodes
//! into a [`VlessDescriptor`] that the engine config translator consumes.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::fmt;

use crate::error::{GatemonError, GatemonResult};

const SCHEME: &str = "vless://";

/// Characters escaped when serializing query values back into a URI.
const QUERY_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'#')
    .add(b'&')
    .add(b'=')
    .add(b'%')
    .add(b'+');

/// Characters escaped when serializing the display tag fragment.
const FRAGMENT_SET: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'#').add(b'%');

/// One parsed VLESS connection descriptor.
///
/// Immutable once parsed; the supervisor holds it for the lifetime of the
/// engine process it spawns for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlessDescriptor {
    /// Opaque credential (UUID) carried in the userinfo segment
    pub user_id: String,
    /// Remote server host
    pub address: String,
    /// Remote server port
    pub port: u16,
    /// Query parameters in source order; duplicates allowed, last wins on lookup
    pub params: Vec<(String, String)>,
    /// Free-text display label from the URI fragment, may be empty
    pub tag: String,
}

impl VlessDescriptor {
    /// Parse a `vless://` URI into a descriptor.
    ///
    /// Fails without producing a partial descriptor: `InvalidScheme` when the
    /// prefix is missing, `InvalidAddress` when the host segment is empty,
    /// `InvalidPort` when the port segment is not a number in [1, 65535].
    /// A missing port defaults to 443.
    pub fn parse(uri: &str) -> GatemonResult<Self> {
        let rest = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| GatemonError::InvalidScheme { uri: uri.to_string() })?;

        // Tags never contain an unescaped '#', so the first '#' is the fragment.
        let (rest, tag) = match rest.split_once('#') {
            Some((head, frag)) => (head, percent_decode_str(frag).decode_utf8_lossy().into_owned()),
            None => (rest, String::new()),
        };

        let (user_id, server) = match rest.split_once('@') {
            Some((user, server)) => (user.to_string(), server),
            None => (String::new(), rest),
        };

        let (server, params) = match server.split_once("/?") {
            Some((server, query)) => (server, parse_query(query)),
            None => (server, Vec::new()),
        };

        let (address, port) = match server.rsplit_once(':') {
            Some((address, port)) => {
                let parsed = port
                    .parse::<u16>()
                    .ok()
                    .filter(|p| *p != 0)
                    .ok_or_else(|| GatemonError::InvalidPort { port: port.to_string() })?;
                (address, parsed)
            }
            None => (server, 443),
        };

        if address.is_empty() {
            return Err(GatemonError::InvalidAddress { uri: uri.to_string() });
        }

        Ok(Self {
            user_id,
            address: address.to_string(),
            port,
            params,
            tag,
        })
    }

    /// Look up a query parameter; the last occurrence of a duplicated key wins.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a query parameter with a fallback default.
    pub fn param_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.param(key).unwrap_or(default)
    }

    /// Serialize back into URI form. Re-parsing the result yields a
    /// field-equal descriptor.
    pub fn to_uri(&self) -> String {
        let mut uri = format!("{}{}@{}:{}", SCHEME, self.user_id, self.address, self.port);
        if !self.params.is_empty() {
            let query: Vec<String> = self
                .params
                .iter()
                .map(|(k, v)| {
                    format!(
                        "{}={}",
                        utf8_percent_encode(k, QUERY_SET),
                        utf8_percent_encode(v, QUERY_SET)
                    )
                })
                .collect();
            uri.push_str("/?");
            uri.push_str(&query.join("&"));
        }
        if !self.tag.is_empty() {
            uri.push('#');
            uri.push_str(&utf8_percent_encode(&self.tag, FRAGMENT_SET).to_string());
        }
        uri
    }
}

impl fmt::Display for VlessDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vless://{}@{}:{} [{}]",
            self.user_id, self.address, self.port, self.tag
        )
    }
}

/// Decode a query string into ordered key=value pairs. `+` decodes to a
/// space, percent escapes decode to UTF-8; pairs without `=` get an empty
/// value.
fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let unplussed = raw.replace('+', " ");
    percent_decode_str(&unplussed).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REALITY_URI: &str = "vless://aa05ee3d-ea0f-49e5-8692-4c4f69797110@ty.example.top:2026/?type=tcp&encryption=none&flow=xtls-rprx-vision&sni=www.cloudflare.com&fp=chrome&security=reality&pbk=8KlmgUWuITzjG-lpUyLHAXRDf7vQ6HU1OV-TGvHR7BY&sid=#%E5%8F%B0%E6%B9%BE";

    #[test]
    fn test_parse_full_reality_uri() {
        let d = VlessDescriptor::parse(REALITY_URI).unwrap();
        assert_eq!(d.user_id, "aa05ee3d-ea0f-49e5-8692-4c4f69797110");
        assert_eq!(d.address, "ty.example.top");
        assert_eq!(d.port, 2026);
        assert_eq!(d.param("type"), Some("tcp"));
        assert_eq!(d.param("security"), Some("reality"));
        assert_eq!(d.param("pbk"), Some("8KlmgUWuITzjG-lpUyLHAXRDf7vQ6HU1OV-TGvHR7BY"));
        assert_eq!(d.param("sid"), Some(""));
        assert_eq!(d.tag, "台湾");
    }

    #[test]
    fn test_parse_spec_example() {
        let d = VlessDescriptor::parse(
            "vless://uuid@host:443/?type=tcp&security=reality&sni=a.com&fp=chrome&pbk=K&sid=S#tag",
        )
        .unwrap();
        assert_eq!(d.user_id, "uuid");
        assert_eq!(d.address, "host");
        assert_eq!(d.port, 443);
        assert_eq!(d.param("sni"), Some("a.com"));
        assert_eq!(d.param("fp"), Some("chrome"));
        assert_eq!(d.param("pbk"), Some("K"));
        assert_eq!(d.param("sid"), Some("S"));
        assert_eq!(d.tag, "tag");
    }

    #[test]
    fn test_invalid_scheme() {
        assert!(matches!(
            VlessDescriptor::parse("not-a-uri"),
            Err(GatemonError::InvalidScheme { .. })
        ));
        assert!(matches!(
            VlessDescriptor::parse("trojan://x@y:1"),
            Err(GatemonError::InvalidScheme { .. })
        ));
    }

    #[test]
    fn test_invalid_address_and_port() {
        assert!(matches!(
            VlessDescriptor::parse("vless://uuid@:443"),
            Err(GatemonError::InvalidAddress { .. })
        ));
        assert!(matches!(
            VlessDescriptor::parse("vless://uuid@host:notaport"),
            Err(GatemonError::InvalidPort { .. })
        ));
        assert!(matches!(
            VlessDescriptor::parse("vless://uuid@host:0"),
            Err(GatemonError::InvalidPort { .. })
        ));
        assert!(matches!(
            VlessDescriptor::parse("vless://uuid@host:70000"),
            Err(GatemonError::InvalidPort { .. })
        ));
    }

    #[test]
    fn test_default_port_and_missing_userinfo() {
        let d = VlessDescriptor::parse("vless://example.com").unwrap();
        assert_eq!(d.user_id, "");
        assert_eq!(d.address, "example.com");
        assert_eq!(d.port, 443);
        assert!(d.params.is_empty());
        assert_eq!(d.tag, "");
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let d = VlessDescriptor::parse("vless://u@h:1/?sni=a.com&sni=b.com").unwrap();
        assert_eq!(d.param("sni"), Some("b.com"));
        assert_eq!(d.params.len(), 2);
    }

    #[test]
    fn test_round_trip() {
        let original = VlessDescriptor::parse(REALITY_URI).unwrap();
        let reparsed = VlessDescriptor::parse(&original.to_uri()).unwrap();
        assert_eq!(original, reparsed);
    }

    #[test]
    fn test_round_trip_ws_path() {
        let uri = "vless://u@h:8443/?type=ws&path=%2Fws%20path&host=cdn.example.com#my tag";
        let original = VlessDescriptor::parse(uri).unwrap();
        assert_eq!(original.param("path"), Some("/ws path"));
        assert_eq!(original.tag, "my tag");
        let reparsed = VlessDescriptor::parse(&original.to_uri()).unwrap();
        assert_eq!(original, reparsed);
    }
}
