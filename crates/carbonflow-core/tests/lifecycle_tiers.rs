//! # Lifecycle Tier Tests (T0-T4)
//!
//! End-to-end behaviour of the engine through the `GraphStore` command layer.
//!
//! ## Tiers
//! - T0: Tabular Import
//! - T1: Aggregation on Connect / Disconnect
//! - T2: History
//! - T3: Credibility & Summary
//! - T4: Records Round-Trip

use carbonflow_core::{
    CompletionStatus, DataSource, GraphStore, ImportPayload, ImportTarget, LcaError, NodeAttributes,
    NodeId, Position, Stage,
};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn leaf(stage: Stage, weight: f64, factor: f64) -> NodeAttributes {
    NodeAttributes {
        stage,
        weight,
        carbon_factor: factor,
        completion_status: CompletionStatus::Completed,
        ..NodeAttributes::default()
    }
}

const BOM: &str = "组件ID,组件名称,重量(g),碳排放因子(kgCO2e/kg)\nC1,外壳,2000,8.0\nC2,电池,500,5.0";

// =============================================================================
// TIER T0: TABULAR IMPORT
// =============================================================================

mod t0_tabular_import {
    use super::*;

    /// T0.1: BOM import yields components plus a summed final product.
    #[test]
    fn bom_scenario() {
        let mut store = GraphStore::default();
        let payload = ImportPayload::new(BOM, ImportTarget::Bom);
        let report = store
            .import_table(&payload, Position::new(400.0, 300.0))
            .expect("import");

        assert_eq!(report.nodes_created, 3);
        assert_eq!(report.edges_created, 2);
        assert!(report.warnings.is_empty());

        let final_id = report.final_product.expect("final product");
        let final_node = store.graph().node(&final_id).expect("node");
        assert_eq!(final_node.stage(), Stage::FinalProduct);
        assert!(approx(final_node.attrs.weight, 2.5));
        assert!(approx(final_node.attrs.carbon_footprint, 18.5));

        let mut weights: Vec<f64> = store
            .graph()
            .nodes()
            .filter(|n| !n.stage().is_final_product())
            .map(|n| n.attrs.weight)
            .collect();
        weights.sort_by(f64::total_cmp);
        assert_eq!(weights, vec![0.5, 2.0]);
        assert_eq!(store.get_predecessors(&final_id).expect("preds").len(), 2);
    }

    /// T0.2: A gram header divides by 1000.
    #[test]
    fn gram_header_normalizes() {
        let mut store = GraphStore::default();
        let payload = ImportPayload::new(
            "名称,重量(g),碳因子\n铜线,1500,4",
            ImportTarget::Stage(Stage::RawMaterial),
        );
        let report = store
            .import_table(&payload, Position::default())
            .expect("import");
        let node = store
            .graph()
            .node(&report.created_node_ids[0])
            .expect("node");
        assert!(approx(node.attrs.weight, 1.5));
        assert!(approx(node.attrs.carbon_footprint, 6.0));
        assert_eq!(node.attrs.data_source, DataSource::TabularImport);
    }

    /// T0.3: Missing BOM columns abort with nothing created.
    #[test]
    fn missing_columns_create_nothing() {
        let mut store = GraphStore::default();
        let payload = ImportPayload::new("名称,材料\n外壳,铝", ImportTarget::Bom);
        let result = store.import_table(&payload, Position::default());

        match result {
            Err(LcaError::MissingRequiredColumns { missing, .. }) => {
                assert_eq!(missing, vec!["weight", "carbonFactor"]);
            }
            other => unreachable!("unexpected result: {:?}", other),
        }
        assert!(store.graph().is_empty());
        assert!(!store.history().can_undo());
    }

    /// T0.4: Staged payloads import at the drop point.
    #[test]
    fn staged_payload_drops_once() {
        let mut store = GraphStore::default();
        store.stage_import(ImportPayload::new(BOM, ImportTarget::Bom).with_source_name("手机"));
        assert!(store.pending_import().is_some());

        let report = store
            .drop_import(Position::new(0.0, 0.0))
            .expect("drop");
        let final_id = report.final_product.expect("final");
        assert_eq!(
            store.graph().node(&final_id).expect("final").label,
            "最终产品-手机"
        );
        assert!(matches!(
            store.drop_import(Position::default()),
            Err(LcaError::NoPendingImport)
        ));
    }

    /// T0.5: Seeded layouts are reproducible.
    #[test]
    fn layout_is_reproducible() {
        let positions = || {
            let mut store = GraphStore::default();
            let payload = ImportPayload::new(BOM, ImportTarget::Bom);
            store
                .import_table(&payload, Position::new(100.0, 100.0))
                .expect("import");
            store
                .graph()
                .nodes()
                .map(|n| (n.position.x, n.position.y))
                .collect::<Vec<_>>()
        };
        assert_eq!(positions(), positions());
    }
}

// =============================================================================
// TIER T1: AGGREGATION ON CONNECT / DISCONNECT
// =============================================================================

mod t1_aggregation {
    use super::*;

    /// T1.1: Disconnecting one source leaves the other's values.
    #[test]
    fn disconnect_scenario() {
        let mut store = GraphStore::default();
        let a = store.add_node("a", Position::default(), leaf(Stage::RawMaterial, 3.0, 3.0));
        let b = store.add_node("b", Position::default(), leaf(Stage::RawMaterial, 2.0, 2.0));
        let t = store.add_node("t", Position::default(), leaf(Stage::Manufacturing, 0.0, 0.0));

        store.add_edge(&a, &t).expect("a->t");
        store.add_edge(&b, &t).expect("b->t");
        let target = store.graph().node(&t).expect("t");
        assert!(approx(target.attrs.weight, 5.0));
        assert!(approx(target.attrs.carbon_footprint, 13.0));

        store.disconnect(&a, &t).expect("disconnect");
        let target = store.graph().node(&t).expect("t");
        assert!(approx(target.attrs.weight, 2.0));
        assert!(approx(target.attrs.carbon_footprint, 4.0));
        assert!(approx(target.attrs.carbon_factor, 2.0));
        assert_eq!(target.attrs.data_source, DataSource::Aggregated);
    }

    /// T1.2: Removing the last source restores the baseline.
    #[test]
    fn disconnect_all_restores_baseline() {
        let mut store = GraphStore::default();
        let a = store.add_node("a", Position::default(), leaf(Stage::RawMaterial, 3.0, 3.0));
        let t = store.add_node("t", Position::default(), leaf(Stage::Usage, 1.0, 7.0));

        let edge = store.add_edge(&a, &t).expect("edge");
        store.remove_edges(&[edge]).expect("remove");
        let target = store.graph().node(&t).expect("t");
        assert!(approx(target.attrs.weight, 1.0));
        assert!(approx(target.attrs.carbon_footprint, 7.0));
    }

    /// T1.3: One-hop aggregation does not reach grandchildren.
    #[test]
    fn one_hop_stops_at_direct_target() {
        let mut store = GraphStore::default();
        let a = store.add_node("a", Position::default(), leaf(Stage::RawMaterial, 1.0, 2.0));
        let m = store.add_node("m", Position::default(), leaf(Stage::Manufacturing, 0.0, 0.0));
        let f = store.add_node("f", Position::default(), leaf(Stage::FinalProduct, 0.0, 0.0));
        store.add_edge(&m, &f).expect("m->f");
        store.add_edge(&a, &m).expect("a->m");

        assert!(approx(store.graph().node(&m).expect("m").attrs.carbon_footprint, 2.0));
        assert!(approx(store.graph().node(&f).expect("f").attrs.carbon_footprint, 0.0));

        let changed = store.calculate_carbon_footprint(&[f.clone()]).expect("calc");
        assert_eq!(changed, vec![f.clone()]);
        let final_node = store.graph().node(&f).expect("f");
        assert!(approx(final_node.attrs.carbon_footprint, 2.0));
        assert_eq!(final_node.attrs.completion_status, CompletionStatus::Completed);
    }

    /// T1.4: Calculation leaves unconnected nodes alone.
    #[test]
    fn calculate_skips_leaves() {
        let mut store = GraphStore::default();
        let a = store.add_node("a", Position::default(), leaf(Stage::RawMaterial, 1.0, 2.0));
        let changed = store.calculate_carbon_footprint(&[a]).expect("calc");
        assert!(changed.is_empty());
    }
}

// =============================================================================
// TIER T2: HISTORY
// =============================================================================

mod t2_history {
    use super::*;

    /// T2.1: Undo at the oldest entry changes nothing.
    #[test]
    fn undo_boundary_is_noop() {
        let mut store = GraphStore::default();
        let before = store.snapshot();
        assert!(!store.undo());
        assert_eq!(store.graph(), &before);
    }

    /// T2.2: Undo and redo walk the recorded snapshots.
    #[test]
    fn round_trip() {
        let mut store = GraphStore::default();
        let a = store.add_node("a", Position::default(), leaf(Stage::RawMaterial, 1.0, 1.0));
        let g1 = store.snapshot();
        let b = store.add_node("b", Position::default(), leaf(Stage::Usage, 1.0, 1.0));
        store.add_edge(&a, &b).expect("edge");
        let g2 = store.snapshot();

        assert!(store.undo());
        assert!(store.undo());
        assert_eq!(store.graph(), &g1);
        assert!(store.redo());
        assert!(store.redo());
        assert_eq!(store.graph(), &g2);
    }

    /// T2.3: A new action after undo discards the redo branch.
    #[test]
    fn new_action_truncates_redo() {
        let mut store = GraphStore::default();
        store.add_node("a", Position::default(), leaf(Stage::RawMaterial, 1.0, 1.0));
        store.add_node("b", Position::default(), leaf(Stage::RawMaterial, 1.0, 1.0));
        assert!(store.undo());
        store.add_node("c", Position::default(), leaf(Stage::RawMaterial, 1.0, 1.0));
        assert!(!store.redo());
        assert_eq!(store.graph().node_count(), 2);
    }

    /// T2.4: Snapshots share untouched nodes with the live graph.
    #[test]
    fn snapshots_share_structure() {
        let mut store = GraphStore::default();
        let a = store.add_node("a", Position::default(), leaf(Stage::RawMaterial, 1.0, 1.0));
        let b = store.add_node("b", Position::default(), leaf(Stage::RawMaterial, 1.0, 1.0));
        let snapshot = store.snapshot();
        assert!(snapshot.shares_nodes_with(store.graph()));

        let update = carbonflow_core::NodeUpdate {
            weight: Some(5.0),
            ..carbonflow_core::NodeUpdate::default()
        };
        store.update_node_data(&b, update).expect("update");
        assert!(!snapshot.shares_nodes_with(store.graph()));
        assert!(snapshot.shares_node_with(store.graph(), &a));
        assert!(!snapshot.shares_node_with(store.graph(), &b));
    }
}

// =============================================================================
// TIER T3: CREDIBILITY & SUMMARY
// =============================================================================

mod t3_scoring {
    use super::*;

    /// T3.1: Credibility tracks every committed change.
    #[test]
    fn credibility_follows_commands() {
        let mut store = GraphStore::default();
        assert!(approx(store.credibility().credibility_score, 0.0));

        store.add_node("a", Position::default(), leaf(Stage::RawMaterial, 1.0, 1.0));
        assert!(approx(store.credibility().credibility_score, 1.0));

        let manual = store.add_node("b", Position::default(), NodeAttributes::default());
        assert!(approx(store.credibility().credibility_score, 0.5));
        assert_eq!(store.credibility().manual_required_nodes[0].id, manual);
        assert_eq!(store.credibility().missing_stages.len(), 4);
    }

    /// T3.2: Summary excludes the synthetic final product.
    #[test]
    fn summary_after_bom() {
        let mut store = GraphStore::default();
        store
            .import_table(&ImportPayload::new(BOM, ImportTarget::Bom), Position::default())
            .expect("import");
        let summary = store.summary();
        assert_eq!(summary.node_count, 2);
        assert!(approx(summary.total_carbon_footprint, 18.5));
        assert_eq!(summary.hotspot_nodes[0].label, "外壳");
        assert_eq!(summary.carbon_factor_sources.get("表格导入"), Some(&2));
    }
}

// =============================================================================
// TIER T4: RECORDS ROUND-TRIP
// =============================================================================

mod t4_records {
    use super::*;
    use carbonflow_core::{Graph, StoreSettings};

    /// T4.1: A saved workflow reloads into an equal graph.
    #[test]
    fn workflow_round_trip() {
        let mut store = GraphStore::default();
        store
            .import_table(&ImportPayload::new(BOM, ImportTarget::Bom), Position::default())
            .expect("import");
        let record = store.graph().to_records("demo").expect("records");
        let json = serde_json::to_string(&record).expect("json");

        let parsed = serde_json::from_str(&json).expect("parse");
        let (graph, skipped) = Graph::from_records(parsed).expect("graph");
        assert_eq!(skipped, 0);
        assert_eq!(&graph, store.graph());

        let reloaded = GraphStore::with_graph(graph, StoreSettings::default());
        assert!(!reloaded.history().can_undo());
        assert_eq!(reloaded.graph().node_count(), 3);
        let ids: Vec<NodeId> = reloaded.graph().nodes().map(|n| n.id.clone()).collect();
        assert!(ids.contains(&NodeId::from("node-3")));
    }
}
