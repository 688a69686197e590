//! Descriptor-to-engine config translation.
//!
//! One [`VlessDescriptor`] serializes into two incompatible schemas: the
//! v2ray document nests stream options under `streamSettings`, sing-box
//! nests them under `tls`/`transport`. Semantics are identical: a SOCKS
//! inbound on `local_port`, an HTTP inbound on `local_port + 1`, both bound
//! to loopback, one vless outbound and a direct bypass for private ranges.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::descriptor::VlessDescriptor;

const LOOPBACK: &str = "127.0.0.1";

// ---------------------------------------------------------------------------
// v2ray schema

#[derive(Debug, Serialize)]
pub struct V2rayConfig {
    pub log: V2rayLog,
    pub inbounds: Vec<V2rayInbound>,
    pub outbounds: Vec<V2rayOutbound>,
    pub routing: V2rayRouting,
}

#[derive(Debug, Serialize)]
pub struct V2rayLog {
    pub loglevel: String,
}

#[derive(Debug, Serialize)]
pub struct V2rayInbound {
    pub port: u16,
    pub listen: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<V2rayInboundSettings>,
}

#[derive(Debug, Serialize)]
pub struct V2rayInboundSettings {
    pub udp: bool,
}

#[derive(Debug, Serialize)]
pub struct V2rayOutbound {
    pub protocol: String,
    pub settings: V2rayOutboundSettings,
    #[serde(rename = "streamSettings", skip_serializing_if = "Option::is_none")]
    pub stream_settings: Option<StreamSettings>,
    pub tag: String,
}

#[derive(Debug, Default, Serialize)]
pub struct V2rayOutboundSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vnext: Option<Vec<VnextServer>>,
}

#[derive(Debug, Serialize)]
pub struct VnextServer {
    pub address: String,
    pub port: u16,
    pub users: Vec<VnextUser>,
}

#[derive(Debug, Serialize)]
pub struct VnextUser {
    pub id: String,
    pub encryption: String,
    pub flow: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    pub network: String,
    pub security: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_settings: Option<TlsSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reality_settings: Option<RealitySettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws_settings: Option<WsSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grpc_settings: Option<GrpcSettings>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsSettings {
    pub server_name: String,
    pub fingerprint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealitySettings {
    pub show: bool,
    pub public_key: String,
    pub short_id: String,
    pub spider_x: String,
}

#[derive(Debug, Serialize)]
pub struct WsSettings {
    pub path: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrpcSettings {
    pub service_name: String,
}

#[derive(Debug, Serialize)]
pub struct V2rayRouting {
    pub rules: Vec<V2rayRule>,
}

#[derive(Debug, Serialize)]
pub struct V2rayRule {
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<Vec<String>>,
    #[serde(rename = "outboundTag")]
    pub outbound_tag: String,
}

/// Translate a descriptor into the v2ray config document, exposing a SOCKS
/// listener on `local_port` and an HTTP listener on `local_port + 1`.
pub fn v2ray_config(d: &VlessDescriptor, local_port: u16) -> V2rayConfig {
    let network = d.param_or("type", "tcp").to_string();
    let security = d.param_or("security", "none").to_string();

    let mut stream = StreamSettings {
        network: network.clone(),
        security: security.clone(),
        tls_settings: None,
        reality_settings: None,
        ws_settings: None,
        grpc_settings: None,
    };

    if security == "tls" || security == "reality" {
        stream.tls_settings = Some(TlsSettings {
            server_name: d.param_or("sni", "").to_string(),
            fingerprint: d.param_or("fp", "chrome").to_string(),
        });
    }
    if security == "reality" {
        stream.reality_settings = Some(RealitySettings {
            show: false,
            public_key: d.param_or("pbk", "").to_string(),
            short_id: d.param_or("sid", "").to_string(),
            spider_x: d.param_or("spx", "").to_string(),
        });
    }

    match network.as_str() {
        "ws" => {
            let mut headers = BTreeMap::new();
            headers.insert(
                "Host".to_string(),
                d.param_or("host", &d.address).to_string(),
            );
            stream.ws_settings = Some(WsSettings {
                path: d.param_or("path", "/").to_string(),
                headers,
            });
        }
        "grpc" => {
            stream.grpc_settings = Some(GrpcSettings {
                service_name: d.param_or("serviceName", "").to_string(),
            });
        }
        _ => {}
    }

    V2rayConfig {
        log: V2rayLog {
            loglevel: "warning".to_string(),
        },
        inbounds: vec![
            V2rayInbound {
                port: local_port,
                listen: LOOPBACK.to_string(),
                protocol: "socks".to_string(),
                settings: Some(V2rayInboundSettings { udp: true }),
            },
            V2rayInbound {
                port: local_port.saturating_add(1),
                listen: LOOPBACK.to_string(),
                protocol: "http".to_string(),
                settings: None,
            },
        ],
        outbounds: vec![
            V2rayOutbound {
                protocol: "vless".to_string(),
                settings: V2rayOutboundSettings {
                    vnext: Some(vec![VnextServer {
                        address: d.address.clone(),
                        port: d.port,
                        users: vec![VnextUser {
                            id: d.user_id.clone(),
                            encryption: d.param_or("encryption", "none").to_string(),
                            flow: d.param_or("flow", "").to_string(),
                        }],
                    }]),
                },
                stream_settings: Some(stream),
                tag: "proxy".to_string(),
            },
            V2rayOutbound {
                protocol: "freedom".to_string(),
                settings: V2rayOutboundSettings::default(),
                stream_settings: None,
                tag: "direct".to_string(),
            },
        ],
        routing: V2rayRouting {
            rules: vec![
                V2rayRule {
                    rule_type: "field".to_string(),
                    ip: Some(vec!["geoip:private".to_string()]),
                    outbound_tag: "direct".to_string(),
                },
                V2rayRule {
                    rule_type: "field".to_string(),
                    ip: None,
                    outbound_tag: "proxy".to_string(),
                },
            ],
        },
    }
}

// ---------------------------------------------------------------------------
// sing-box schema

#[derive(Debug, Serialize)]
pub struct SingBoxConfig {
    pub log: SingBoxLog,
    pub inbounds: Vec<SingBoxInbound>,
    pub outbounds: Vec<SingBoxOutbound>,
    pub route: SingBoxRoute,
}

#[derive(Debug, Serialize)]
pub struct SingBoxLog {
    pub level: String,
    pub timestamp: bool,
}

#[derive(Debug, Serialize)]
pub struct SingBoxInbound {
    #[serde(rename = "type")]
    pub kind: String,
    pub tag: String,
    pub listen: String,
    pub listen_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub udp: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SingBoxOutbound {
    #[serde(rename = "type")]
    pub kind: String,
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<SingBoxTls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<SingBoxTransport>,
}

#[derive(Debug, Serialize)]
pub struct SingBoxTls {
    pub enabled: bool,
    pub server_name: String,
    pub utls: SingBoxUtls,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reality: Option<SingBoxReality>,
}

#[derive(Debug, Serialize)]
pub struct SingBoxUtls {
    pub enabled: bool,
    pub fingerprint: String,
}

#[derive(Debug, Serialize)]
pub struct SingBoxReality {
    pub enabled: bool,
    pub public_key: String,
    pub short_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spider_x: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SingBoxTransport {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SingBoxRoute {
    pub rules: Vec<SingBoxRule>,
    #[serde(rename = "final")]
    pub final_outbound: String,
}

#[derive(Debug, Serialize)]
pub struct SingBoxRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoip: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geosite: Option<Vec<String>>,
    pub outbound: String,
}

/// Translate a descriptor into the sing-box config document. Listener
/// layout matches [`v2ray_config`]: SOCKS on `local_port`, HTTP on
/// `local_port + 1`, loopback only.
pub fn sing_box_config(d: &VlessDescriptor, local_port: u16) -> SingBoxConfig {
    let network = d.param_or("type", "tcp").to_string();
    let security = d.param_or("security", "none");

    let tls = if security == "tls" || security == "reality" {
        let reality = if security == "reality" {
            Some(SingBoxReality {
                enabled: true,
                public_key: d.param_or("pbk", "").to_string(),
                short_id: d.param_or("sid", "").to_string(),
                spider_x: d.param("spx").map(str::to_string),
            })
        } else {
            None
        };
        Some(SingBoxTls {
            enabled: true,
            server_name: d.param_or("sni", "").to_string(),
            utls: SingBoxUtls {
                enabled: true,
                fingerprint: d.param_or("fp", "chrome").to_string(),
            },
            reality,
        })
    } else {
        None
    };

    let transport = match network.as_str() {
        "ws" => {
            let mut headers = BTreeMap::new();
            headers.insert(
                "Host".to_string(),
                d.param_or("host", &d.address).to_string(),
            );
            Some(SingBoxTransport {
                kind: "ws".to_string(),
                path: Some(d.param_or("path", "/").to_string()),
                headers: Some(headers),
                service_name: None,
            })
        }
        "grpc" => Some(SingBoxTransport {
            kind: "grpc".to_string(),
            path: None,
            headers: None,
            service_name: Some(d.param_or("serviceName", "").to_string()),
        }),
        _ => None,
    };

    SingBoxConfig {
        log: SingBoxLog {
            level: "info".to_string(),
            timestamp: true,
        },
        inbounds: vec![
            SingBoxInbound {
                kind: "socks".to_string(),
                tag: "socks-in".to_string(),
                listen: LOOPBACK.to_string(),
                listen_port: local_port,
                udp: Some(true),
            },
            SingBoxInbound {
                kind: "http".to_string(),
                tag: "http-in".to_string(),
                listen: LOOPBACK.to_string(),
                listen_port: local_port.saturating_add(1),
                udp: None,
            },
        ],
        outbounds: vec![
            SingBoxOutbound {
                kind: "vless".to_string(),
                tag: "vless-out".to_string(),
                server: Some(d.address.clone()),
                server_port: Some(d.port),
                uuid: Some(d.user_id.clone()),
                flow: Some(d.param_or("flow", "").to_string()),
                network: Some(network),
                tls,
                transport,
            },
            SingBoxOutbound {
                kind: "direct".to_string(),
                tag: "direct".to_string(),
                server: None,
                server_port: None,
                uuid: None,
                flow: None,
                network: None,
                tls: None,
                transport: None,
            },
            SingBoxOutbound {
                kind: "block".to_string(),
                tag: "block".to_string(),
                server: None,
                server_port: None,
                uuid: None,
                flow: None,
                network: None,
                tls: None,
                transport: None,
            },
        ],
        route: SingBoxRoute {
            rules: vec![
                SingBoxRule {
                    geoip: Some(vec!["private".to_string()]),
                    geosite: None,
                    outbound: "direct".to_string(),
                },
                SingBoxRule {
                    geoip: None,
                    geosite: Some(vec!["category-ads-all".to_string()]),
                    outbound: "block".to_string(),
                },
            ],
            final_outbound: "vless-out".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::VlessDescriptor;

    fn reality_descriptor() -> VlessDescriptor {
        VlessDescriptor::parse(
            "vless://uuid@host:443/?type=tcp&security=reality&sni=a.com&fp=chrome&pbk=K&sid=S#t",
        )
        .unwrap()
    }

    #[test]
    fn test_v2ray_reality_blocks() {
        let cfg = v2ray_config(&reality_descriptor(), 10800);
        let json = serde_json::to_value(&cfg).unwrap();

        assert_eq!(json["inbounds"][0]["port"], 10800);
        assert_eq!(json["inbounds"][0]["protocol"], "socks");
        assert_eq!(json["inbounds"][1]["port"], 10801);
        assert_eq!(json["inbounds"][1]["protocol"], "http");
        assert_eq!(json["inbounds"][0]["listen"], "127.0.0.1");

        let stream = &json["outbounds"][0]["streamSettings"];
        assert_eq!(stream["security"], "reality");
        assert_eq!(stream["tlsSettings"]["serverName"], "a.com");
        assert_eq!(stream["tlsSettings"]["fingerprint"], "chrome");
        assert_eq!(stream["realitySettings"]["publicKey"], "K");
        assert_eq!(stream["realitySettings"]["shortId"], "S");
    }

    #[test]
    fn test_sing_box_reality_blocks() {
        let cfg = sing_box_config(&reality_descriptor(), 10800);
        let json = serde_json::to_value(&cfg).unwrap();

        assert_eq!(json["inbounds"][0]["listen_port"], 10800);
        assert_eq!(json["inbounds"][1]["listen_port"], 10801);

        let out = &json["outbounds"][0];
        assert_eq!(out["type"], "vless");
        assert_eq!(out["server"], "host");
        assert_eq!(out["server_port"], 443);
        assert_eq!(out["tls"]["server_name"], "a.com");
        assert_eq!(out["tls"]["utls"]["fingerprint"], "chrome");
        assert_eq!(out["tls"]["reality"]["public_key"], "K");
        assert_eq!(out["tls"]["reality"]["short_id"], "S");
        assert_eq!(json["route"]["final"], "vless-out");
    }

    #[test]
    fn test_no_tls_block_when_security_absent() {
        let d = VlessDescriptor::parse("vless://uuid@host:443/?type=tcp").unwrap();

        let v2ray = serde_json::to_value(v2ray_config(&d, 10800)).unwrap();
        let stream = &v2ray["outbounds"][0]["streamSettings"];
        assert!(stream.get("tlsSettings").is_none());
        assert!(stream.get("realitySettings").is_none());

        let sing_box = serde_json::to_value(sing_box_config(&d, 10800)).unwrap();
        assert!(sing_box["outbounds"][0].get("tls").is_none());
    }

    #[test]
    fn test_ws_transport_defaults() {
        let d = VlessDescriptor::parse("vless://uuid@host:443/?type=ws").unwrap();

        let v2ray = serde_json::to_value(v2ray_config(&d, 10800)).unwrap();
        let ws = &v2ray["outbounds"][0]["streamSettings"]["wsSettings"];
        assert_eq!(ws["path"], "/");
        assert_eq!(ws["headers"]["Host"], "host");

        let sing_box = serde_json::to_value(sing_box_config(&d, 10800)).unwrap();
        let transport = &sing_box["outbounds"][0]["transport"];
        assert_eq!(transport["type"], "ws");
        assert_eq!(transport["path"], "/");
        assert_eq!(transport["headers"]["Host"], "host");
    }

    #[test]
    fn test_grpc_transport() {
        let d = VlessDescriptor::parse("vless://uuid@host:443/?type=grpc&serviceName=svc").unwrap();

        let v2ray = serde_json::to_value(v2ray_config(&d, 10800)).unwrap();
        assert_eq!(
            v2ray["outbounds"][0]["streamSettings"]["grpcSettings"]["serviceName"],
            "svc"
        );

        let sing_box = serde_json::to_value(sing_box_config(&d, 10800)).unwrap();
        assert_eq!(sing_box["outbounds"][0]["transport"]["service_name"], "svc");
    }

    #[test]
    fn test_spider_x_only_when_present() {
        let with = VlessDescriptor::parse("vless://u@h:1/?security=reality&spx=%2F").unwrap();
        let without = VlessDescriptor::parse("vless://u@h:1/?security=reality").unwrap();

        let json = serde_json::to_value(sing_box_config(&with, 10800)).unwrap();
        assert_eq!(json["outbounds"][0]["tls"]["reality"]["spider_x"], "/");

        let json = serde_json::to_value(sing_box_config(&without, 10800)).unwrap();
        assert!(json["outbounds"][0]["tls"]["reality"]
            .get("spider_x")
            .is_none());
    }
}
