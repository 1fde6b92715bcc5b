//! # Canvas Helpers
//!
//! Starter nodes for lifecycle stages and the stage-column layout.
//!
//! A stage template carries the stage's default footprint and the
//! stage-specific fields the optimizer reads. Templates start
//! `manual-required`, so the next completion batch picks them up.

use crate::graph::Graph;
use crate::primitives::{
    AUTO_LAYOUT_COLUMN_SPACING, AUTO_LAYOUT_ORIGIN_X, AUTO_LAYOUT_ORIGIN_Y,
    AUTO_LAYOUT_ROW_SPACING, TEMPLATE_FACTOR_DIVISOR,
};
use crate::{CompletionStatus, DataSource, LcaError, Node, NodeAttributes, NodeId, Position, Stage};
use serde_json::{Value, json};

/// Stages added together by "add all stages". Raw material comes from a
/// BOM import instead.
pub const TEMPLATE_STAGES: [Stage; 4] = [
    Stage::Manufacturing,
    Stage::Distribution,
    Stage::Usage,
    Stage::Disposal,
];

// =============================================================================
// STAGE TEMPLATES
// =============================================================================

/// Footprint (kgCO2e) a new stage node starts from.
#[must_use]
pub fn default_footprint(stage: Stage) -> f64 {
    match stage {
        Stage::RawMaterial => 20.0,
        Stage::Manufacturing => 12.0,
        Stage::Distribution | Stage::Disposal => 4.0,
        Stage::Usage => 3.0,
        Stage::FinalProduct | Stage::Unclassified => 0.0,
    }
}

/// Where a new stage node lands relative to the point it was added at.
///
/// The five stages fan out in an arc so adding them all does not stack them.
#[must_use]
pub fn stage_position(stage: Stage, anchor: Position) -> Position {
    let (dx, dy) = match stage {
        Stage::RawMaterial => (-200.0, -100.0),
        Stage::Manufacturing => (-100.0, 0.0),
        Stage::Distribution => (0.0, 100.0),
        Stage::Usage => (100.0, 0.0),
        Stage::Disposal => (200.0, -100.0),
        Stage::FinalProduct | Stage::Unclassified => (0.0, 0.0),
    };
    Position::new(anchor.x + dx, anchor.y + dy)
}

fn stage_fields(stage: Stage) -> Value {
    match stage {
        Stage::Manufacturing => json!({
            "energyConsumption": 1500,
            "energyType": "电力",
            "processEfficiency": 85,
            "wasteGeneration": 50,
            "waterConsumption": 200
        }),
        Stage::Distribution => json!({
            "transportationMode": "公路运输",
            "transportationDistance": 500,
            "vehicleType": "重型卡车",
            "fuelType": "柴油",
            "fuelEfficiency": 3.5,
            "loadFactor": 70,
            "packagingMaterial": "纸箱",
            "packagingWeight": 0.5,
            "warehouseEnergy": 200,
            "storageTime": 30
        }),
        Stage::Usage => json!({
            "lifespan": 5,
            "energyConsumptionPerUse": 0.5,
            "waterConsumptionPerUse": 2,
            "usageFrequency": 200,
            "maintenanceFrequency": 2,
            "repairRate": 5,
            "userBehaviorImpact": 6,
            "efficiencyDegradation": 3,
            "standbyEnergyConsumption": 0.1
        }),
        Stage::Disposal => json!({
            "recyclingRate": 40,
            "landfillPercentage": 30,
            "incinerationPercentage": 20,
            "compostPercentage": 5,
            "reusePercentage": 5,
            "hazardousWasteContent": 1,
            "biodegradability": 20,
            "disposalEnergyRecovery": 0.2,
            "transportToDisposal": 50,
            "disposalMethod": "混合处理"
        }),
        Stage::RawMaterial | Stage::FinalProduct | Stage::Unclassified => json!({}),
    }
}

/// Attributes of a fresh `stage` node, baseline captured.
#[must_use]
pub fn stage_attributes(stage: Stage) -> NodeAttributes {
    let footprint = default_footprint(stage);
    let mut attrs = NodeAttributes {
        stage,
        carbon_footprint: footprint,
        carbon_factor: footprint / TEMPLATE_FACTOR_DIVISOR,
        data_source: DataSource::Manual,
        completion_status: CompletionStatus::ManualRequired,
        ..NodeAttributes::default()
    };
    let common = json!({
        "calculationMethod": "ISO 14067",
        "uncertainty": "中",
        "verificationStatus": "未验证",
        "applicableStandard": "ISO 14040"
    });
    for fields in [common, stage_fields(stage)] {
        if let Value::Object(map) = fields {
            attrs.extra.extend(map);
        }
    }
    attrs.capture_baseline();
    attrs
}

// =============================================================================
// STAGE-COLUMN LAYOUT
// =============================================================================

/// Canvas order within a column: top to bottom, ties by id.
fn by_height<'a>(nodes: impl Iterator<Item = &'a Node>) -> Vec<&'a Node> {
    let mut nodes: Vec<&Node> = nodes.collect();
    nodes.sort_by(|a, b| {
        a.position
            .y
            .total_cmp(&b.position.y)
            .then_with(|| a.id.cmp(&b.id))
    });
    nodes
}

/// New positions for the stage-column layout.
///
/// One column per canonical stage in lifecycle order, then the final
/// products one column further right, vertically centred on the staged
/// nodes. Unclassified nodes are not moved.
pub fn stage_columns(graph: &Graph) -> Result<Vec<(NodeId, Position)>, LcaError> {
    let finals = by_height(graph.nodes().filter(|n| n.stage().is_final_product()));
    if finals.is_empty() {
        return Err(LcaError::NoFinalProduct);
    }

    let mut placed = Vec::new();
    let mut staged = 0usize;
    for (column, stage) in Stage::CANONICAL.into_iter().enumerate() {
        let members = by_height(graph.nodes().filter(|n| n.stage() == stage));
        staged += members.len();
        for (row, node) in members.into_iter().enumerate() {
            placed.push((
                node.id.clone(),
                Position::new(
                    AUTO_LAYOUT_ORIGIN_X + column as f64 * AUTO_LAYOUT_COLUMN_SPACING,
                    AUTO_LAYOUT_ORIGIN_Y + row as f64 * AUTO_LAYOUT_ROW_SPACING,
                ),
            ));
        }
    }

    let final_x =
        AUTO_LAYOUT_ORIGIN_X + Stage::CANONICAL.len() as f64 * AUTO_LAYOUT_COLUMN_SPACING;
    let centre_y = AUTO_LAYOUT_ORIGIN_Y + staged as f64 / 2.0 * AUTO_LAYOUT_ROW_SPACING;
    for (row, node) in finals.into_iter().enumerate() {
        placed.push((
            node.id.clone(),
            Position::new(final_x, centre_y + row as f64 * AUTO_LAYOUT_ROW_SPACING),
        ));
    }
    Ok(placed)
}
