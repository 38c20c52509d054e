//! Catalog Module Tests
//!
//! ## Test Scopes
//! - **Addresses**: parsing and node extraction.
//! - **Replica Selection**: strategies and all-or-nothing liveness.
//! - **Route Computation**: determinism, deduplication, slice choice.
//! - **Catalog Parsing**: datasets, slices per node, configuration errors.

#[cfg(test)]
mod tests {
    use crate::catalog::dataset::Catalog;
    use crate::catalog::replicas::ReplicasVolume;
    use crate::catalog::slice::Slice;
    use crate::catalog::types::{
        Address, LiveNodes, Message, MessageType, ReplicaStrategy, Route, SliceStrategy,
    };
    use crate::catalog::volume::Volume;
    use crate::error::ConfigurationError;
    use serde_json::json;

    const NODE_A: &str = "127.0.0.1:10031/droonga";
    const NODE_B: &str = "127.0.0.2:10031/droonga";
    const NODE_C: &str = "127.0.0.3:10031/droonga";

    fn live(nodes: &[&str]) -> LiveNodes {
        nodes.iter().map(|node| node.to_string()).collect()
    }

    fn single(address: &str) -> Volume {
        Volume::from_raw(&json!({ "address": address })).unwrap()
    }

    fn three_replicas() -> ReplicasVolume {
        ReplicasVolume::new(vec![
            single("127.0.0.1:10031/droonga.000"),
            single("127.0.0.2:10031/droonga.000"),
            single("127.0.0.3:10031/droonga.000"),
        ])
        .unwrap()
    }

    fn catalog_json() -> serde_json::Value {
        json!({
            "datasets": {
                "Default": {
                    "nWorkers": 4,
                    "plugins": ["groonga", "search"],
                    "replicas": [
                        {
                            "slices": [
                                { "weight": 50, "volume": { "address": "127.0.0.1:10031/droonga.000" } },
                                { "weight": 50, "volume": { "address": "127.0.0.1:10031/droonga.001" } }
                            ]
                        },
                        {
                            "slices": [
                                { "weight": 50, "volume": { "address": "127.0.0.2:10031/droonga.000" } },
                                { "weight": 50, "volume": { "address": "127.0.0.2:10031/droonga.001" } }
                            ]
                        }
                    ]
                }
            }
        })
    }

    fn scatter(replica: &str) -> Message {
        let mut message = Message::new(MessageType::Scatter, "search");
        message.replica = ReplicaStrategy::from(replica);
        message
    }

    // ============================================================
    // ADDRESS TESTS
    // ============================================================

    #[test]
    fn test_address_parse_with_local_name() {
        let address = Address::parse("127.0.0.1:10031/droonga.000").unwrap();

        assert_eq!(address.host, "127.0.0.1");
        assert_eq!(address.port, 10031);
        assert_eq!(address.tag, "droonga");
        assert_eq!(address.local_name.as_deref(), Some("000"));
        assert_eq!(address.node(), NODE_A);
        assert_eq!(address.to_string(), "127.0.0.1:10031/droonga.000");
    }

    #[test]
    fn test_address_parse_node_only() {
        let address = Address::parse(NODE_B).unwrap();

        assert_eq!(address.local_name, None);
        assert_eq!(address.to_string(), NODE_B);
    }

    #[test]
    fn test_address_parse_rejects_garbage() {
        assert!(matches!(
            Address::parse("not-an-address"),
            Err(ConfigurationError::InvalidAddress(_))
        ));
    }

    // ============================================================
    // REPLICA SELECTION TESTS
    // ============================================================

    #[test]
    fn test_select_all_ignores_liveness() {
        let replicas = three_replicas();

        assert_eq!(replicas.select(&ReplicaStrategy::All, &live(&[])).len(), 3);
        assert_eq!(replicas.select(&ReplicaStrategy::All, &live(&[NODE_A])).len(), 3);
        assert_eq!(
            replicas
                .select(&ReplicaStrategy::All, &live(&[NODE_A, NODE_B, NODE_C]))
                .len(),
            3
        );
    }

    #[test]
    fn test_select_top_returns_first_live_replica() {
        let replicas = three_replicas();

        let selected = replicas.select(&ReplicaStrategy::Top, &live(&[NODE_B, NODE_C]));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].all_nodes(), vec![NODE_B.to_string()]);

        let selected = replicas.select(&ReplicaStrategy::Top, &live(&[NODE_A, NODE_B, NODE_C]));
        assert_eq!(selected[0].all_nodes(), vec![NODE_A.to_string()]);
    }

    #[test]
    fn test_select_top_without_live_replica_is_empty() {
        let replicas = three_replicas();

        assert!(replicas.select(&ReplicaStrategy::Top, &live(&[])).is_empty());
    }

    #[test]
    fn test_select_random_picks_one_live_replica() {
        let replicas = three_replicas();

        for _ in 0..20 {
            let selected = replicas.select(&ReplicaStrategy::Random, &live(&[NODE_C]));
            assert_eq!(selected.len(), 1);
            assert_eq!(selected[0].all_nodes(), vec![NODE_C.to_string()]);
        }
        assert!(replicas.select(&ReplicaStrategy::Random, &live(&[])).is_empty());
    }

    #[test]
    fn test_select_unknown_strategy_enumerates_every_replica() {
        let replicas = three_replicas();
        let strategy = ReplicaStrategy::from("nearest");

        assert_eq!(strategy, ReplicaStrategy::Other("nearest".to_string()));
        assert_eq!(replicas.select(&strategy, &live(&[])).len(), 3);
    }

    #[test]
    fn test_partially_live_replica_is_not_eligible() {
        // one replica spread over two nodes
        let spread = Volume::from_raw(&json!({
            "slices": [
                { "volume": { "address": "127.0.0.1:10031/droonga.000" } },
                { "volume": { "address": "127.0.0.2:10031/droonga.001" } }
            ]
        }))
        .unwrap();
        let replicas = ReplicasVolume::new(vec![spread, single("127.0.0.3:10031/droonga.000")]).unwrap();

        let eligible = replicas.live_volumes(&live(&[NODE_A, NODE_C]));
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].all_nodes(), vec![NODE_C.to_string()]);
    }

    #[test]
    fn test_empty_replica_set_is_rejected() {
        assert_eq!(
            ReplicasVolume::new(vec![]).unwrap_err(),
            ConfigurationError::EmptyReplicas
        );
    }

    #[test]
    fn test_replicas_equality_by_sequence() {
        assert_eq!(three_replicas(), three_replicas());

        let reversed = ReplicasVolume::new(vec![
            single("127.0.0.3:10031/droonga.000"),
            single("127.0.0.2:10031/droonga.000"),
            single("127.0.0.1:10031/droonga.000"),
        ])
        .unwrap();
        assert_ne!(three_replicas(), reversed);
    }

    // ============================================================
    // ROUTE COMPUTATION TESTS
    // ============================================================

    #[test]
    fn test_compute_routes_is_idempotent_and_sorted() {
        let catalog = Catalog::from_value(&catalog_json()).unwrap();
        let dataset = catalog.dataset("Default").unwrap();
        let live_nodes = live(&[NODE_A, NODE_B]);
        let message = scatter("all");

        let first = dataset.compute_routes(&message, &live_nodes);
        let second = dataset.compute_routes(&message, &live_nodes);

        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                Route::new("127.0.0.1:10031/droonga.000"),
                Route::new("127.0.0.1:10031/droonga.001"),
                Route::new("127.0.0.2:10031/droonga.000"),
                Route::new("127.0.0.2:10031/droonga.001"),
            ]
        );
    }

    #[test]
    fn test_compute_routes_deduplicates_shared_endpoints() {
        let replicas = ReplicasVolume::new(vec![
            single("127.0.0.1:10031/droonga.000"),
            single("127.0.0.1:10031/droonga.000"),
        ])
        .unwrap();

        let routes = replicas.compute_routes(&scatter("all"), &live(&[NODE_A]));
        assert_eq!(routes, vec![Route::new("127.0.0.1:10031/droonga.000")]);
    }

    #[test]
    fn test_compute_routes_ignores_reduce_and_gather() {
        let replicas = three_replicas();
        let live_nodes = live(&[NODE_A, NODE_B, NODE_C]);

        let reduce = Message::new(MessageType::Reduce, "sum");
        let gather = Message::new(MessageType::Gather, "gather");

        assert!(replicas.compute_routes(&reduce, &live_nodes).is_empty());
        assert!(replicas.compute_routes(&gather, &live_nodes).is_empty());
    }

    #[test]
    fn test_broadcast_top_follows_liveness() {
        let catalog = Catalog::from_value(&catalog_json()).unwrap();
        let dataset = catalog.dataset("Default").unwrap();
        let mut message = Message::new(MessageType::Broadcast, "add");
        message.replica = ReplicaStrategy::Top;

        let routes = dataset.compute_routes(&message, &live(&[NODE_B]));
        assert_eq!(
            routes,
            vec![
                Route::new("127.0.0.2:10031/droonga.000"),
                Route::new("127.0.0.2:10031/droonga.001"),
            ]
        );
    }

    #[test]
    fn test_scatter_with_record_key_reaches_one_slice_per_replica() {
        let catalog = Catalog::from_value(&catalog_json()).unwrap();
        let dataset = catalog.dataset("Default").unwrap();
        let mut message = scatter("all");
        message.record = Some(json!({ "_key": "Alice" }));

        let routes = dataset.compute_routes(&message, &live(&[NODE_A, NODE_B]));
        assert_eq!(routes.len(), 2);

        let locals: Vec<Option<String>> = routes
            .iter()
            .map(|route| route.address().unwrap().local_name)
            .collect();
        assert_eq!(locals[0], locals[1]);

        // same key, same slice
        assert_eq!(routes, dataset.compute_routes(&message, &live(&[NODE_A, NODE_B])));
    }

    #[test]
    fn test_weighted_slice_choice_respects_zero_share() {
        let sliced = Volume::from_raw(&json!({
            "slices": [
                { "weight": 1, "volume": { "address": "127.0.0.1:10031/droonga.000" } },
                { "weight": 1000, "volume": { "address": "127.0.0.1:10031/droonga.001" } }
            ]
        }))
        .unwrap();

        let Volume::Sliced(sliced) = sliced else {
            panic!("expected a sliced volume");
        };

        let heavy = (0..200)
            .filter(|i| sliced.choose_slice(&format!("key-{}", i)).weight == 1000)
            .count();
        assert!(heavy > 150, "heavy slice should own most keys, got {}", heavy);
    }

    #[test]
    fn test_slice_choice_is_stable_across_processes() {
        let sliced = Volume::from_raw(&json!({
            "slices": [
                { "label": "even", "volume": { "address": "127.0.0.1:10031/droonga.000" } },
                { "label": "odd", "volume": { "address": "127.0.0.1:10031/droonga.001" } }
            ]
        }))
        .unwrap();
        let Volume::Sliced(sliced) = sliced else {
            panic!("expected a sliced volume");
        };

        // positions come from the SHA-256 digest of the key
        let owner = |key: &str| sliced.choose_slice(key).label.clone();
        assert_eq!(owner("Alice").as_deref(), Some("odd"));
        assert_eq!(owner("Bob").as_deref(), Some("even"));
        assert_eq!(owner("Carol").as_deref(), Some("even"));
        assert_eq!(owner("key-1").as_deref(), Some("odd"));
    }

    #[test]
    fn test_labelled_slice_strategy_selects_matching_slices() {
        let volume = Volume::from_raw(&json!({
            "slices": [
                { "label": "hot", "volume": { "address": "127.0.0.1:10031/droonga.000" } },
                { "label": "cold", "volume": { "address": "127.0.0.1:10031/droonga.001" } },
                { "volume": { "address": "127.0.0.1:10031/droonga.002" } }
            ]
        }))
        .unwrap();
        let nodes = live(&[NODE_A]);

        let mut message = Message::new(MessageType::Broadcast, "search");
        assert_eq!(volume.compute_routes(&message, &nodes).len(), 3);

        message.slice = SliceStrategy::Other("cold".to_string());
        assert_eq!(
            volume.compute_routes(&message, &nodes),
            vec![Route::new("127.0.0.1:10031/droonga.001")]
        );

        message.kind = MessageType::Scatter;
        assert_eq!(
            volume.compute_routes(&message, &nodes),
            vec![Route::new("127.0.0.1:10031/droonga.001")]
        );

        message.slice = SliceStrategy::Other("missing".to_string());
        assert!(volume.compute_routes(&message, &nodes).is_empty());
    }

    // ============================================================
    // TOPOLOGY TESTS
    // ============================================================

    #[test]
    fn test_all_nodes_is_sorted_union() {
        let catalog = Catalog::from_value(&catalog_json()).unwrap();

        assert_eq!(
            catalog.all_nodes(),
            &[NODE_A.to_string(), NODE_B.to_string()]
        );
        assert_eq!(
            catalog.dataset("Default").unwrap().all_nodes(),
            &[NODE_A.to_string(), NODE_B.to_string()]
        );
    }

    #[test]
    fn test_sliced_flag() {
        let catalog = Catalog::from_value(&catalog_json()).unwrap();
        assert!(catalog.dataset("Default").unwrap().replicas.is_sliced());
        assert!(!three_replicas().is_sliced());
    }

    #[test]
    fn test_single_slice_volume_is_not_sliced() {
        let volume = Volume::from_raw(&json!({
            "slices": [
                { "weight": 10, "volume": { "address": "127.0.0.1:10031/droonga.000" } }
            ]
        }))
        .unwrap();

        assert!(matches!(volume, Volume::Sliced(_)));
        assert!(!volume.is_sliced());
    }

    #[test]
    fn test_slice_without_backing_fails_fast() {
        let result = Slice::from_raw(&json!({ "weight": 10, "label": "orphan" }));

        assert!(matches!(result, Err(ConfigurationError::SliceWithoutBacking(_))));
    }

    #[test]
    fn test_slice_reports_backing_nodes() {
        let slice = Slice::from_raw(&json!({
            "label": "slice000",
            "replicas": [
                { "address": "127.0.0.2:10031/droonga.000" },
                { "address": "127.0.0.1:10031/droonga.000" }
            ]
        }))
        .unwrap();

        assert_eq!(slice.weight, 1);
        assert_eq!(slice.label.as_deref(), Some("slice000"));
        assert!(slice.volume().is_none());
        assert_eq!(slice.replicas().map(|r| r.len()), Some(2));
        assert_eq!(slice.all_nodes(), &[NODE_A.to_string(), NODE_B.to_string()]);
    }

    #[test]
    fn test_catalog_slices_for_node() {
        let catalog = Catalog::from_value(&catalog_json()).unwrap();

        let slices = catalog.slices(NODE_A);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices["000"].dataset, "Default");
        assert_eq!(slices["001"].dataset, "Default");
        assert!(catalog.slices(NODE_C).is_empty());
    }

    #[test]
    fn test_catalog_unknown_dataset() {
        let catalog = Catalog::from_value(&catalog_json()).unwrap();

        assert_eq!(
            catalog.dataset("Missing").unwrap_err(),
            ConfigurationError::UnknownDataset("Missing".to_string())
        );
    }

    #[test]
    fn test_catalog_dataset_metadata() {
        let catalog = Catalog::from_value(&catalog_json()).unwrap();
        let dataset = catalog.dataset("Default").unwrap();

        assert_eq!(dataset.n_workers, 4);
        assert_eq!(dataset.plugins, vec!["groonga", "search"]);
        assert_eq!(dataset.replicas.len(), 2);
    }

    #[test]
    fn test_message_strategies_round_trip_as_strings() {
        let raw = json!({
            "type": "broadcast",
            "command": "add",
            "dataset": "Default",
            "replica": "random",
            "slice": "all",
            "post": true
        });

        let message: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(message.kind, MessageType::Broadcast);
        assert_eq!(message.replica, ReplicaStrategy::Random);

        let encoded = serde_json::to_value(&message).unwrap();
        assert_eq!(encoded["replica"], "random");
        assert_eq!(encoded["type"], "broadcast");
    }
}
