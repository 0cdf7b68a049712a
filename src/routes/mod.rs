//! Route table parsing
//!
//! Parses `ip route show` output from a node or pod so route advertisement
//! checks can assert which prefixes were learned over BGP.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use crate::models::{IpPrefix, ParseError};

/// Route types that precede the destination
const ROUTE_TYPES: &[&str] = &[
    "unicast",
    "local",
    "broadcast",
    "multicast",
    "blackhole",
    "unreachable",
    "prohibit",
    "throw",
    "nat",
    "anycast",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Default,
    Prefix(IpPrefix),
}

impl Destination {
    fn matches(&self, prefix: &IpPrefix) -> bool {
        match self {
            Destination::Prefix(p) => p == prefix,
            Destination::Default => prefix.len() == 0,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Default => f.write_str("default"),
            Destination::Prefix(p) => write!(f, "{p}"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHop {
    pub via: Option<IpAddr>,
    pub dev: Option<String>,
    pub weight: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub destination: Destination,
    pub route_type: Option<String>,
    pub nexthops: Vec<NextHop>,
    pub proto: Option<String>,
    pub metric: Option<u32>,
}

impl Route {
    pub fn has_proto(&self, proto: &str) -> bool {
        self.proto.as_deref() == Some(proto)
    }

    pub fn gateways(&self) -> Vec<IpAddr> {
        self.nexthops.iter().filter_map(|n| n.via).collect()
    }
}

/// Parsed routing table
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RouteTable {
    pub routes: Vec<Route>,
}

impl RouteTable {
    /// Parse `ip route show` (IPv4 or IPv6) output
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut routes: Vec<Route> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            if raw.trim().is_empty() {
                continue;
            }

            let continuation = raw.starts_with(char::is_whitespace);
            let mut tokens = raw.split_whitespace().peekable();

            if continuation {
                if tokens.peek() != Some(&"nexthop") {
                    continue;
                }
                tokens.next();
                let route = routes.last_mut().ok_or(ParseError::MalformedRoute {
                    line: line_no,
                    reason: "nexthop without a route".to_string(),
                })?;
                let hop = parse_nexthop(&mut tokens, line_no)?;
                route.nexthops.push(hop);
                continue;
            }

            let mut first = tokens.next().unwrap_or_default();
            let mut route_type = None;
            if ROUTE_TYPES.contains(&first) {
                route_type = Some(first.to_string());
                first = tokens.next().ok_or(ParseError::MalformedRoute {
                    line: line_no,
                    reason: "missing destination".to_string(),
                })?;
            }

            let destination = if first == "default" {
                Destination::Default
            } else {
                Destination::Prefix(first.parse().map_err(|_| ParseError::MalformedRoute {
                    line: line_no,
                    reason: format!("bad destination '{first}'"),
                })?)
            };

            let mut route = Route {
                destination,
                route_type,
                nexthops: Vec::new(),
                proto: None,
                metric: None,
            };
            let mut hop = NextHop::default();

            while let Some(token) = tokens.next() {
                match token {
                    "via" => hop.via = Some(parse_via(&mut tokens, line_no)?),
                    "dev" => hop.dev = tokens.next().map(str::to_string),
                    "proto" => route.proto = tokens.next().map(str::to_string),
                    "metric" => route.metric = tokens.next().and_then(|v| v.parse().ok()),
                    // Keyword/value pairs we don't keep
                    "nhid" | "src" | "scope" | "table" | "pref" | "mtu" | "expires" => {
                        tokens.next();
                    }
                    _ => {}
                }
            }

            if hop.via.is_some() || hop.dev.is_some() {
                route.nexthops.push(hop);
            }
            routes.push(route);
        }

        Ok(Self { routes })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes installed by a given protocol, e.g. `bgp`
    pub fn learned_via(&self, proto: &str) -> Vec<&Route> {
        self.routes.iter().filter(|r| r.has_proto(proto)).collect()
    }

    pub fn find(&self, prefix: &IpPrefix) -> Option<&Route> {
        self.routes.iter().find(|r| r.destination.matches(prefix))
    }

    /// Expected prefixes that are absent, or present with another protocol
    pub fn missing_prefixes(&self, expected: &[IpPrefix], proto: &str) -> Vec<IpPrefix> {
        expected
            .iter()
            .filter(|prefix| {
                !self
                    .routes
                    .iter()
                    .any(|r| r.destination.matches(prefix) && r.has_proto(proto))
            })
            .copied()
            .collect()
    }
}

/// Result of checking one table against expected prefixes
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteCheck {
    pub source: String,
    pub proto: String,
    pub learned: Vec<String>,
    pub missing: Vec<IpPrefix>,
}

impl RouteCheck {
    pub fn new(source: impl Into<String>, table: &RouteTable, expected: &[IpPrefix], proto: &str) -> Self {
        Self {
            source: source.into(),
            proto: proto.to_string(),
            learned: table
                .learned_via(proto)
                .iter()
                .map(|r| r.destination.to_string())
                .collect(),
            missing: table.missing_prefixes(expected, proto),
        }
    }

    pub fn passed(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Read the address after `via`, skipping an optional `inet`/`inet6` family word
fn parse_via<'a, I>(tokens: &mut I, line: usize) -> Result<IpAddr, ParseError>
where
    I: Iterator<Item = &'a str>,
{
    let mut token = tokens.next();
    if matches!(token, Some("inet") | Some("inet6")) {
        token = tokens.next();
    }
    let token = token.ok_or(ParseError::MalformedRoute {
        line,
        reason: "'via' without address".to_string(),
    })?;
    token.parse().map_err(|_| ParseError::MalformedRoute {
        line,
        reason: format!("bad gateway '{token}'"),
    })
}

fn parse_nexthop<'a, I>(tokens: &mut I, line: usize) -> Result<NextHop, ParseError>
where
    I: Iterator<Item = &'a str>,
{
    let mut hop = NextHop::default();
    while let Some(token) = tokens.next() {
        match token {
            "via" => hop.via = Some(parse_via(tokens, line)?),
            "dev" => hop.dev = tokens.next().map(str::to_string),
            "weight" => hop.weight = tokens.next().and_then(|w| w.parse().ok()),
            _ => {}
        }
    }
    Ok(hop)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE_ROUTES: &str = "\
default via 192.168.111.1 dev br-ex proto dhcp src 192.168.111.20 metric 48
10.128.0.0/23 nhid 45 via 192.168.111.21 dev br-ex proto bgp metric 20
10.129.0.0/23 nhid 60 proto bgp metric 20
\tnexthop via 192.168.111.22 dev br-ex weight 1
\tnexthop via 192.168.111.23 dev br-ex weight 1
blackhole 10.0.0.0/8 proto static
172.18.0.0/16 dev eth0 proto kernel scope link src 172.18.0.3

";

    fn prefix(s: &str) -> IpPrefix {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_node_routes() {
        let table = RouteTable::parse(NODE_ROUTES).unwrap();
        assert_eq!(table.len(), 5);

        let default = &table.routes[0];
        assert_eq!(default.destination, Destination::Default);
        assert_eq!(default.metric, Some(48));
        assert_eq!(default.gateways(), vec!["192.168.111.1".parse::<IpAddr>().unwrap()]);

        let blackhole = &table.routes[3];
        assert_eq!(blackhole.route_type.as_deref(), Some("blackhole"));
        assert!(blackhole.nexthops.is_empty());

        let kernel = &table.routes[4];
        assert_eq!(kernel.nexthops[0].dev.as_deref(), Some("eth0"));
        assert_eq!(kernel.nexthops[0].via, None);
    }

    #[test]
    fn test_parse_multipath() {
        let table = RouteTable::parse(NODE_ROUTES).unwrap();
        let ecmp = table.find(&prefix("10.129.0.0/23")).unwrap();

        assert_eq!(ecmp.nexthops.len(), 2);
        assert_eq!(ecmp.nexthops[1].weight, Some(1));
        assert_eq!(ecmp.gateways()[1].to_string(), "192.168.111.23");
    }

    #[test]
    fn test_learned_via_bgp() {
        let table = RouteTable::parse(NODE_ROUTES).unwrap();
        let bgp: Vec<String> = table
            .learned_via("bgp")
            .iter()
            .map(|r| r.destination.to_string())
            .collect();
        assert_eq!(bgp, vec!["10.128.0.0/23", "10.129.0.0/23"]);
    }

    #[test]
    fn test_missing_prefixes() {
        let table = RouteTable::parse(NODE_ROUTES).unwrap();
        let expected = [
            prefix("10.128.0.0/23"),
            prefix("10.129.0.0/23"),
            prefix("10.130.0.0/23"),
            prefix("172.18.0.0/16"),
        ];
        // 172.18/16 exists but was not learned over BGP
        assert_eq!(
            table.missing_prefixes(&expected, "bgp"),
            vec![prefix("10.130.0.0/23"), prefix("172.18.0.0/16")]
        );
    }

    #[test]
    fn test_expected_prefix_with_host_bits_matches() {
        let table = RouteTable::parse(NODE_ROUTES).unwrap();
        let expected = [prefix("10.128.0.1/23"), prefix("10.129.1.9/23")];
        assert!(table.missing_prefixes(&expected, "bgp").is_empty());
    }

    #[test]
    fn test_route_check() {
        let table = RouteTable::parse(NODE_ROUTES).unwrap();
        let check = RouteCheck::new("worker-0", &table, &[prefix("10.128.0.0/23")], "bgp");
        assert!(check.passed());
        assert_eq!(check.learned.len(), 2);

        let check = RouteCheck::new("worker-0", &table, &[prefix("10.140.0.0/23")], "bgp");
        assert!(!check.passed());
        assert_eq!(check.missing, vec![prefix("10.140.0.0/23")]);
    }

    #[test]
    fn test_parse_ipv6_routes() {
        let text = "\
fd01:0:0:1::/64 nhid 12 via fd00::21 dev br-ex proto bgp metric 20 pref medium
fe80::/64 dev eth0 proto kernel metric 256 pref medium
10.131.0.0/23 via inet6 fe80::1 dev br-ex proto bgp metric 20
";
        let table = RouteTable::parse(text).unwrap();
        assert_eq!(table.learned_via("bgp").len(), 2);
        assert_eq!(table.routes[0].gateways()[0].to_string(), "fd00::21");
        assert_eq!(table.routes[2].gateways()[0].to_string(), "fe80::1");
    }

    #[test]
    fn test_malformed_routes() {
        let err = RouteTable::parse("\tnexthop via 10.0.0.1 dev eth0\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedRoute { line: 1, .. }));

        let err = RouteTable::parse("default via 10.0.0.1\n10.0.0.0/99 dev eth0\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedRoute { line: 2, .. }));

        let err = RouteTable::parse("default via banana dev eth0").unwrap_err();
        assert!(err.to_string().contains("bad gateway"));
    }

    #[test]
    fn test_empty_output() {
        assert!(RouteTable::parse("\n\n").unwrap().is_empty());
    }
}
