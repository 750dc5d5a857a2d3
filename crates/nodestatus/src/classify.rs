//! Endpoint classification: which declared nodes get probed, which endpoint
//! URLs exist, and whether the manifest declares the mandatory roles.
//!
//! [`classify`] does no I/O and touches no report. [`Classification::apply`]
//! copies its findings into a [`ProducerReport`] before any probe runs, so
//! every endpoint record exists by the time probes append to it.

use std::collections::BTreeSet;

use crate::manifest::{DeclaredNode, Feature, NodeEntry, NodeRole};
use crate::report::ProducerReport;

pub const MISSING_SSL: &str = "No SSL api nodes defined (ssl_endpoint)";
pub const MISSING_P2P: &str = "No P2P nodes defined (p2p_endpoint)";
pub const MISSING_CHAIN_API: &str = "No chain api nodes defined";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Nodes declaring `query` or `seed`, in manifest order.
    pub probeable: Vec<DeclaredNode>,
    /// Every endpoint URL seen on a node with a valid `node_type`.
    pub endpoints: BTreeSet<String>,
    pub has_ssl: bool,
    pub has_p2p: bool,
    pub has_chain_api: bool,
    /// Structural problems, one per offending entry, then one per missing role.
    pub errors: Vec<String>,
}

impl Classification {
    /// Register endpoints and record structural errors on `report`.
    pub fn apply(&self, report: &mut ProducerReport) {
        for url in &self.endpoints {
            report.register_endpoint(url);
        }
        for err in &self.errors {
            report.error(err.clone());
        }
    }
}

pub fn classify(nodes: &[NodeEntry]) -> Classification {
    let mut out = Classification::default();

    for (i, entry) in nodes.iter().enumerate() {
        let index = i + 1;
        let node = match entry {
            NodeEntry::Parsed(node) => node,
            NodeEntry::Malformed(e) => {
                out.errors.push(format!("node {index} is malformed: {e}"));
                continue;
            }
        };

        let Some(node_type) = &node.node_type else {
            out.errors.push(format!("node_type not present for node {index}"));
            continue;
        };

        if let Some(url) = &node.api_endpoint {
            out.endpoints.insert(url.clone());
        }
        if let Some(url) = &node.ssl_endpoint {
            out.has_ssl = true;
            out.endpoints.insert(url.clone());
        }
        if let Some(url) = &node.p2p_endpoint {
            out.has_p2p = true;
            out.endpoints.insert(url.clone());
        }

        let is_query = node_type.contains(&NodeRole::Query);
        if is_query && node.features.is_none() {
            out.errors
                .push(format!("features not present for node {index} of type query"));
            continue;
        }

        let features = node.features.clone().unwrap_or_default();
        if features.contains(&Feature::ChainApi) {
            out.has_chain_api = true;
        }

        if is_query || node_type.contains(&NodeRole::Seed) {
            out.probeable.push(DeclaredNode {
                index,
                roles: node_type.0.clone(),
                features,
                api_endpoint: node.api_endpoint.clone(),
                ssl_endpoint: node.ssl_endpoint.clone(),
                p2p_endpoint: node.p2p_endpoint.clone(),
            });
        }
    }

    if !out.has_ssl {
        out.errors.push(MISSING_SSL.to_string());
    }
    if !out.has_p2p {
        out.errors.push(MISSING_P2P.to_string());
    }
    if !out.has_chain_api {
        out.errors.push(MISSING_CHAIN_API.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parse_manifest;
    use crate::producer::ProducerInfo;
    use crate::report::Status;

    fn classify_json(nodes: &str) -> Classification {
        let manifest = parse_manifest(&format!(r#"{{"org": {{}}, "nodes": {nodes}}}"#)).unwrap();
        classify(&manifest.nodes)
    }

    #[test]
    fn test_complete_manifest_has_no_errors() {
        let c = classify_json(
            r#"[{"node_type": ["query", "seed"], "features": ["chain-api"],
                 "ssl_endpoint": "https://bp.example/", "p2p_endpoint": "p2p.example:9876"}]"#,
        );
        assert!(c.errors.is_empty(), "{:?}", c.errors);
        assert_eq!(c.probeable.len(), 1);
        assert!(c.probeable[0].is_query() && c.probeable[0].is_seed());
        assert_eq!(c.endpoints.len(), 2);
    }

    #[test]
    fn test_missing_ssl() {
        let c = classify_json(
            r#"[{"node_type": "query", "features": ["chain-api"], "api_endpoint": "http://bp.example"},
                {"node_type": "seed", "p2p_endpoint": "p2p.example:9876"}]"#,
        );
        assert_eq!(c.errors, vec![MISSING_SSL]);
    }

    #[test]
    fn test_missing_p2p() {
        let c = classify_json(
            r#"[{"node_type": "query", "features": ["chain-api"], "ssl_endpoint": "https://bp.example"}]"#,
        );
        assert_eq!(c.errors, vec![MISSING_P2P]);
    }

    #[test]
    fn test_missing_chain_api() {
        let c = classify_json(
            r#"[{"node_type": "query", "features": ["history-v1"], "ssl_endpoint": "https://bp.example"},
                {"node_type": "seed", "p2p_endpoint": "p2p.example:9876"}]"#,
        );
        assert_eq!(c.errors, vec![MISSING_CHAIN_API]);
    }

    #[test]
    fn test_empty_manifest_reports_every_missing_role() {
        let c = classify_json("[]");
        assert_eq!(c.errors, vec![MISSING_SSL, MISSING_P2P, MISSING_CHAIN_API]);
        assert!(c.probeable.is_empty());
    }

    #[test]
    fn test_structural_errors_do_not_stop_the_walk() {
        let c = classify_json(
            r#"[{"ssl_endpoint": "https://ignored.example"},
                {"node_type": "query", "ssl_endpoint": "https://nofeatures.example"},
                {"node_type": ["query", "seed"], "features": ["chain-api"],
                 "ssl_endpoint": "https://bp.example", "p2p_endpoint": "p2p.example:9876"}]"#,
        );
        assert_eq!(
            c.errors,
            vec![
                "node_type not present for node 1".to_string(),
                "features not present for node 2 of type query".to_string(),
            ]
        );
        assert_eq!(c.probeable.len(), 1);
        assert_eq!(c.probeable[0].index, 3);
        // Untyped nodes contribute nothing; typed ones register even when skipped.
        assert!(!c.endpoints.contains("https://ignored.example"));
        assert!(c.endpoints.contains("https://nofeatures.example"));
    }

    #[test]
    fn test_same_url_on_two_nodes_is_one_endpoint() {
        let c = classify_json(
            r#"[{"node_type": "query", "features": ["chain-api"], "api_endpoint": "http://bp.example", "ssl_endpoint": "https://bp.example"},
                {"node_type": "query", "features": ["history-v1"], "api_endpoint": "http://bp.example"},
                {"node_type": "seed", "p2p_endpoint": "p2p.example:9876"}]"#,
        );
        assert_eq!(
            c.endpoints.iter().filter(|u| *u == "http://bp.example").count(),
            1
        );
        assert_eq!(c.endpoints.len(), 3);
    }

    #[test]
    fn test_producer_only_nodes_are_not_probed() {
        let c = classify_json(
            r#"[{"node_type": "producer"},
                {"node_type": "seed", "p2p_endpoint": "p2p.example:9876"}]"#,
        );
        assert_eq!(c.probeable.len(), 1);
        assert!(c.probeable[0].is_seed());
    }

    #[test]
    fn test_apply_escalates_and_registers() {
        let c = classify_json(r#"[{"node_type": "seed", "p2p_endpoint": "p2p.example:9876"}]"#);
        let mut report = ProducerReport::new(&ProducerInfo::new("bpa", "https://bp.example", 1, true));
        c.apply(&mut report);
        assert_eq!(report.status(), Status::Failure);
        assert!(report.endpoints.contains_key("p2p.example:9876"));
        assert!(report.errors.contains(&MISSING_SSL.to_string()));
        assert!(report.errors.contains(&MISSING_CHAIN_API.to_string()));
    }
}
