//! Entity network construction.
//!
//! Pure, stateless transformation from a user's committed entity rows into a
//! deduplicated co-occurrence graph. DATE-typed entities are excluded as
//! non-relational noise. The graph is undirected and simple: no self-loops,
//! no parallel edges; an edge's weight is the number of distinct cases in
//! which both endpoints appear.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use uuid::Uuid;

use crate::defaults::TOP_CONNECTIONS_LIMIT;
use crate::models::{
    Case, CaseRef, Entity, EntityConnection, EntityDetail, EntityNetwork, EntityType, NetworkEdge,
    NetworkNode, NetworkStats,
};

/// Build the co-occurrence network for a set of entity rows.
///
/// Rows are grouped by case-insensitive identity key (`normalized_name` when
/// present, else `entity_name`); each group becomes one node labeled by its
/// first-encountered row. For every case, each unordered pair of distinct
/// identities present in that case contributes exactly one weight increment
/// — duplicate rows of the same identity within a case never inflate an
/// edge.
pub fn build_network(entities: &[Entity]) -> EntityNetwork {
    let relational: Vec<&Entity> = entities
        .iter()
        .filter(|e| e.entity_type != EntityType::Date)
        .collect();

    if relational.is_empty() {
        return EntityNetwork {
            nodes: Vec::new(),
            edges: Vec::new(),
            stats: NetworkStats {
                total_nodes: 0,
                total_edges: 0,
                entity_types: HashMap::new(),
                avg_connections: 0.0,
            },
        };
    }

    // Group rows by identity key, preserving first-encounter order so node
    // ids are stable for a given input ordering.
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Entity>> = HashMap::new();
    for &entity in &relational {
        let key = entity.identity_key();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(entity);
    }

    let mut node_index: HashMap<&str, usize> = HashMap::new();
    let mut nodes: Vec<NetworkNode> = Vec::with_capacity(order.len());

    for (idx, key) in order.iter().enumerate() {
        let group = &groups[key];
        let first = group[0];

        let mut seen_cases = HashSet::new();
        let mut case_ids: Vec<Uuid> = Vec::new();
        for entity in group {
            if seen_cases.insert(entity.case_id) {
                case_ids.push(entity.case_id);
            }
        }

        nodes.push(NetworkNode {
            id: idx.to_string(),
            label: first.entity_name.clone(),
            entity_type: first.entity_type,
            case_count: case_ids.len(),
            case_ids,
            entity_ids: group.iter().map(|e| e.entity_id).collect(),
        });
        node_index.insert(key.as_str(), idx);
    }

    // Distinct identity keys per case, then one weight increment per case
    // for every unordered pair co-occurring in it.
    let mut case_keys: BTreeMap<Uuid, BTreeSet<String>> = BTreeMap::new();
    for entity in &relational {
        case_keys
            .entry(entity.case_id)
            .or_default()
            .insert(entity.identity_key());
    }

    let mut weights: BTreeMap<(String, String), i64> = BTreeMap::new();
    for keys in case_keys.values() {
        let keys: Vec<&String> = keys.iter().collect();
        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                // BTreeSet iteration is sorted, so (keys[i], keys[j]) is
                // already the canonical ordering of the pair.
                *weights
                    .entry((keys[i].clone(), keys[j].clone()))
                    .or_insert(0) += 1;
            }
        }
    }

    let mut edges: Vec<NetworkEdge> = Vec::with_capacity(weights.len());
    for ((a, b), weight) in &weights {
        edges.push(NetworkEdge {
            id: format!("e{}", edges.len()),
            source: node_index[a.as_str()].to_string(),
            target: node_index[b.as_str()].to_string(),
            weight: *weight,
        });
    }

    let mut entity_types: HashMap<String, i64> = HashMap::new();
    for node in &nodes {
        *entity_types
            .entry(node.entity_type.as_str().to_string())
            .or_insert(0) += 1;
    }

    let avg_connections = if nodes.is_empty() {
        0.0
    } else {
        let raw = edges.len() as f64 * 2.0 / nodes.len() as f64;
        (raw * 100.0).round() / 100.0
    };

    let stats = NetworkStats {
        total_nodes: nodes.len(),
        total_edges: edges.len(),
        entity_types,
        avg_connections,
    };

    EntityNetwork {
        nodes,
        edges,
        stats,
    }
}

/// Detail view for one canonical entity name across a user's cases.
///
/// Matching is case-insensitive on the surface name. Co-occurring entities
/// are every *other* entity in the matched cases, ranked by row count
/// descending (top 10). Returns `None` when no row matches.
pub fn entity_detail(entities: &[Entity], cases: &[Case], name: &str) -> Option<EntityDetail> {
    let needle = name.to_lowercase();

    let matching: Vec<&Entity> = entities
        .iter()
        .filter(|e| e.entity_name.to_lowercase() == needle)
        .collect();
    let first = *matching.first()?;

    let case_ids: HashSet<Uuid> = matching.iter().map(|e| e.case_id).collect();

    let case_refs: Vec<CaseRef> = cases
        .iter()
        .filter(|c| case_ids.contains(&c.case_id))
        .map(|c| CaseRef {
            case_id: c.case_id,
            filename: c.filename.clone(),
            court_name: c.court_name.clone(),
            case_date: c.case_date,
        })
        .collect();

    // Count co-occurring rows grouped by identity key; remember the first
    // surface name/type seen per key.
    let mut counts: HashMap<String, (String, EntityType, i64)> = HashMap::new();
    for entity in entities {
        if !case_ids.contains(&entity.case_id) || entity.entity_name.to_lowercase() == needle {
            continue;
        }
        let key = entity.identity_key();
        let slot = counts
            .entry(key)
            .or_insert_with(|| (entity.entity_name.clone(), entity.entity_type, 0));
        slot.2 += 1;
    }

    let mut top_connections: Vec<EntityConnection> = counts
        .into_values()
        .map(|(name, entity_type, count)| EntityConnection {
            name,
            entity_type,
            count,
        })
        .collect();
    top_connections.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    top_connections.truncate(TOP_CONNECTIONS_LIMIT);

    Some(EntityDetail {
        entity_name: first.entity_name.clone(),
        entity_type: first.entity_type,
        normalized_name: first.normalized_name.clone(),
        occurrence_count: matching.len(),
        case_count: case_refs.len(),
        cases: case_refs,
        top_connections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entity(name: &str, entity_type: EntityType, case_id: Uuid) -> Entity {
        Entity {
            entity_id: Uuid::new_v4(),
            case_id,
            owner_user_id: Uuid::nil(),
            entity_type,
            entity_name: name.to_string(),
            normalized_name: Some(name.to_lowercase()),
            confidence: Some(0.9),
            page_number: Some(1),
            created_at: Utc::now(),
        }
    }

    fn edge_weight<'a>(net: &'a EntityNetwork, a: &str, b: &str) -> Option<i64> {
        let idx = |label: &str| {
            net.nodes
                .iter()
                .find(|n| n.label == label)
                .map(|n| n.id.clone())
        };
        let (ia, ib) = (idx(a)?, idx(b)?);
        net.edges
            .iter()
            .find(|e| {
                (e.source == ia && e.target == ib) || (e.source == ib && e.target == ia)
            })
            .map(|e| e.weight)
    }

    #[test]
    fn test_empty_input_yields_empty_graph() {
        let net = build_network(&[]);
        assert!(net.nodes.is_empty());
        assert!(net.edges.is_empty());
        assert_eq!(net.stats.total_nodes, 0);
        assert_eq!(net.stats.avg_connections, 0.0);
    }

    #[test]
    fn test_cooccurrence_weights_across_cases() {
        // {A,B in case1}, {B,C in case2}, {A,B in case2}
        let case1 = Uuid::new_v4();
        let case2 = Uuid::new_v4();
        let rows = vec![
            entity("A", EntityType::Person, case1),
            entity("B", EntityType::Person, case1),
            entity("B", EntityType::Person, case2),
            entity("C", EntityType::Org, case2),
            entity("A", EntityType::Person, case2),
        ];

        let net = build_network(&rows);

        assert_eq!(net.nodes.len(), 3);
        assert_eq!(edge_weight(&net, "A", "B"), Some(2));
        assert_eq!(edge_weight(&net, "B", "C"), Some(1));
        assert_eq!(edge_weight(&net, "A", "C"), Some(1));
        assert_eq!(net.stats.total_edges, 3);
    }

    #[test]
    fn test_no_edge_without_shared_case() {
        // A appears only in case1, so no (A,C) edge exists.
        let case1 = Uuid::new_v4();
        let case2 = Uuid::new_v4();
        let rows = vec![
            entity("A", EntityType::Person, case1),
            entity("B", EntityType::Person, case1),
            entity("B", EntityType::Person, case2),
            entity("C", EntityType::Org, case2),
        ];

        let net = build_network(&rows);

        assert_eq!(net.nodes.len(), 3);
        assert_eq!(net.stats.total_edges, 2);
        assert_eq!(edge_weight(&net, "A", "B"), Some(1));
        assert_eq!(edge_weight(&net, "B", "C"), Some(1));
        assert_eq!(edge_weight(&net, "A", "C"), None);
        // avg degree = 2 * 2 / 3
        assert!((net.stats.avg_connections - 1.33).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_rows_in_one_case_do_not_inflate_weight() {
        let case1 = Uuid::new_v4();
        let rows = vec![
            entity("A", EntityType::Person, case1),
            entity("A", EntityType::Person, case1),
            entity("B", EntityType::Person, case1),
        ];

        let net = build_network(&rows);
        assert_eq!(edge_weight(&net, "A", "B"), Some(1));
        // No self-loop from the duplicated A rows.
        assert_eq!(net.stats.total_edges, 1);
    }

    #[test]
    fn test_date_entities_excluded() {
        let case1 = Uuid::new_v4();
        let rows = vec![
            entity("A", EntityType::Person, case1),
            entity("15th January 2023", EntityType::Date, case1),
        ];

        let net = build_network(&rows);
        assert_eq!(net.nodes.len(), 1);
        assert!(net.edges.is_empty());
        assert!(!net.stats.entity_types.contains_key("DATE"));
    }

    #[test]
    fn test_case_insensitive_identity_merges_nodes() {
        let case1 = Uuid::new_v4();
        let case2 = Uuid::new_v4();
        let mut upper = entity("John Smith", EntityType::Person, case1);
        upper.normalized_name = Some("john smith".to_string());
        let mut lower = entity("john smith", EntityType::Person, case2);
        lower.normalized_name = Some("John Smith".to_string());

        let net = build_network(&[upper, lower]);

        assert_eq!(net.nodes.len(), 1);
        let node = &net.nodes[0];
        assert_eq!(node.label, "John Smith");
        assert_eq!(node.case_count, 2);
        assert_eq!(node.entity_ids.len(), 2);
    }

    #[test]
    fn test_node_aggregates_cases_and_row_ids() {
        let case1 = Uuid::new_v4();
        let case2 = Uuid::new_v4();
        let rows = vec![
            entity("Delhi High Court", EntityType::Court, case1),
            entity("Delhi High Court", EntityType::Court, case2),
            entity("Delhi High Court", EntityType::Court, case2),
        ];

        let net = build_network(&rows);
        assert_eq!(net.nodes.len(), 1);
        let node = &net.nodes[0];
        assert_eq!(node.case_count, 2);
        assert_eq!(node.case_ids.len(), 2);
        assert_eq!(node.entity_ids.len(), 3);
    }

    #[test]
    fn test_stats_count_nodes_by_type() {
        let case1 = Uuid::new_v4();
        let rows = vec![
            entity("A", EntityType::Person, case1),
            entity("B", EntityType::Person, case1),
            entity("CBI", EntityType::Org, case1),
        ];

        let net = build_network(&rows);
        assert_eq!(net.stats.entity_types["PERSON"], 2);
        assert_eq!(net.stats.entity_types["ORG"], 1);
    }

    fn case(id: Uuid, filename: &str) -> Case {
        Case {
            case_id: id,
            uploaded_by: Uuid::nil(),
            filename: filename.to_string(),
            file_path: None,
            raw_text: None,
            status: crate::models::CaseStatus::Complete,
            court_name: None,
            case_date: None,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_entity_detail_unknown_name() {
        assert!(entity_detail(&[], &[], "Nobody").is_none());
    }

    #[test]
    fn test_entity_detail_cases_and_connections() {
        let case1 = Uuid::new_v4();
        let case2 = Uuid::new_v4();
        let rows = vec![
            entity("John Smith", EntityType::Person, case1),
            entity("john smith", EntityType::Person, case2),
            entity("CBI", EntityType::Org, case1),
            entity("CBI", EntityType::Org, case2),
            entity("Mumbai", EntityType::Location, case2),
        ];
        let cases = vec![case(case1, "a.pdf"), case(case2, "b.pdf")];

        let detail = entity_detail(&rows, &cases, "JOHN SMITH").expect("entity exists");

        assert_eq!(detail.occurrence_count, 2);
        assert_eq!(detail.case_count, 2);
        assert_eq!(detail.top_connections.len(), 2);
        // CBI appears twice across the matched cases, Mumbai once.
        assert_eq!(detail.top_connections[0].name, "CBI");
        assert_eq!(detail.top_connections[0].count, 2);
        assert_eq!(detail.top_connections[1].name, "Mumbai");
        assert_eq!(detail.top_connections[1].count, 1);
    }

    #[test]
    fn test_entity_detail_caps_connections_at_ten() {
        let case1 = Uuid::new_v4();
        let mut rows = vec![entity("Hub", EntityType::Person, case1)];
        for i in 0..15 {
            rows.push(entity(&format!("Peer {i}"), EntityType::Person, case1));
        }
        let cases = vec![case(case1, "hub.pdf")];

        let detail = entity_detail(&rows, &cases, "Hub").expect("entity exists");
        assert_eq!(detail.top_connections.len(), 10);
    }
}
