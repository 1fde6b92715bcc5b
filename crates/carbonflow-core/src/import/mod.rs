//! # Tabular Import Engine
//!
//! Turns delimited lifecycle or BOM text into a cluster of nodes and edges.
//!
//! ## Pipeline
//!
//! 1. Split lines and cells ([`delimited`]); separator and line ending are
//!    auto-detected.
//! 2. Map header columns to fields by keyword ([`columns`]).
//! 3. Reject the whole import on structural problems: no header, missing
//!    required columns, or zero surviving rows.
//! 4. Parse rows. A bad numeric cell becomes `0` with a warning; a row is
//!    skipped only when it is too short to reach a required column.
//! 5. Lay nodes out around the drop point ([`layout`]). BOM imports also get a
//!    synthetic `FinalProduct` node fed by every row.
//!
//! Planning is pure: the caller commits the returned nodes and edges.

pub mod columns;
pub mod delimited;
pub mod layout;

use crate::primitives::{COAL_FACTOR, ELECTRICITY_FACTOR, NATURAL_GAS_FACTOR, round2};
use crate::{
    CompletionStatus, DataSource, Edge, LcaError, Node, NodeAttributes, NodeId, Position, Stage,
};
use columns::{ColumnMap, FieldKind, FieldSpec, WeightUnit};
use delimited::{Row, Table};
use layout::LayoutConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// IMPORT TARGET & PAYLOAD
// =============================================================================

/// What a table describes: a bill of materials or one lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ImportTarget {
    Bom,
    Stage(Stage),
}

impl ImportTarget {
    /// Stage assigned to the imported row nodes.
    #[must_use]
    pub fn row_stage(self) -> Stage {
        match self {
            Self::Bom => Stage::RawMaterial,
            Self::Stage(stage) => stage,
        }
    }
}

impl fmt::Display for ImportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bom => f.write_str("BOM"),
            Self::Stage(stage) => f.write_str(stage.key()),
        }
    }
}

impl FromStr for ImportTarget {
    type Err = LcaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("bom") {
            return Ok(Self::Bom);
        }
        match Stage::from_label(s) {
            Stage::Unclassified | Stage::FinalProduct => {
                Err(LcaError::UnknownImportTarget(s.to_string()))
            }
            stage => Ok(Self::Stage(stage)),
        }
    }
}

impl TryFrom<String> for ImportTarget {
    type Error = LcaError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ImportTarget> for String {
    fn from(target: ImportTarget) -> Self {
        target.to_string()
    }
}

/// Tabular text waiting to be dropped onto the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportPayload {
    pub text: String,
    pub target: ImportTarget,
    /// Name of the uploaded file, used to label the BOM final product.
    #[serde(default = "default_source_name")]
    pub source_name: String,
}

fn default_source_name() -> String {
    "BOM".to_string()
}

impl ImportPayload {
    #[must_use]
    pub fn new(text: impl Into<String>, target: ImportTarget) -> Self {
        Self {
            text: text.into(),
            target,
            source_name: default_source_name(),
        }
    }

    #[must_use]
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// A recovered per-cell problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportWarning {
    pub line: usize,
    pub column: String,
    pub message: String,
}

/// Outcome of a successful import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub nodes_created: usize,
    pub edges_created: usize,
    pub skipped_rows: usize,
    pub warnings: Vec<ImportWarning>,
    pub created_node_ids: Vec<NodeId>,
    pub final_product: Option<NodeId>,
}

/// Nodes and edges ready to commit, plus the report.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub report: ImportReport,
}

// =============================================================================
// ROW PARSING
// =============================================================================

struct ParsedRow {
    name: String,
    material: Option<String>,
    attrs: NodeAttributes,
}

struct RowParser<'a> {
    target: ImportTarget,
    headers: &'a [String],
    map: ColumnMap,
    fields: &'static [FieldSpec],
    weight_unit: WeightUnit,
    per_unit_weight_unit: WeightUnit,
    warnings: Vec<ImportWarning>,
}

impl RowParser<'_> {
    fn header(&self, index: usize) -> String {
        self.headers.get(index).cloned().unwrap_or_default()
    }

    /// Parse a numeric cell. Unmapped or empty cells are `None`; invalid or
    /// negative values read as 0 with a warning.
    fn number(&mut self, row: &Row, field: &str) -> Option<f64> {
        let index = self.map.get(field)?;
        let raw = row.cell(index);
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
            _ => {
                self.warnings.push(ImportWarning {
                    line: row.line,
                    column: self.header(index),
                    message: format!("invalid number '{}', using 0", raw),
                });
                Some(0.0)
            }
        }
    }

    fn text(&self, row: &Row, field: &str) -> Option<String> {
        let index = self.map.get(field)?;
        let raw = row.cell(index);
        (!raw.is_empty()).then(|| raw.to_string())
    }

    fn parse(&mut self, row: &Row) -> ParsedRow {
        let stage = self.target.row_stage();
        let name = self
            .text(row, columns::NAME)
            .unwrap_or_else(|| format!("{} {}", stage.label(), row.line));

        let mut extra = BTreeMap::new();
        for field in self.fields {
            if matches!(
                field.name,
                columns::NAME | columns::WEIGHT | columns::CARBON_FACTOR
            ) {
                continue;
            }
            let value = match field.kind {
                FieldKind::Number => self.number(row, field.name).map(Value::from),
                FieldKind::Text => self.text(row, field.name).map(Value::from),
            };
            if let Some(value) = value {
                extra.insert(field.name.to_string(), value);
            }
        }

        let mut weight = self
            .number(row, columns::WEIGHT)
            .map_or(0.0, |w| self.weight_unit.to_kg(w));
        if weight == 0.0 {
            let quantity = extra.get(columns::QUANTITY).and_then(Value::as_f64);
            let per_unit = extra.get(columns::WEIGHT_PER_UNIT).and_then(Value::as_f64);
            if let (Some(q), Some(u)) = (quantity, per_unit) {
                weight = q * self.per_unit_weight_unit.to_kg(u);
            }
        }
        let factor = self.number(row, columns::CARBON_FACTOR).unwrap_or(0.0);

        let mut attrs = NodeAttributes::leaf(stage, weight, factor);
        attrs.data_source = DataSource::TabularImport;
        attrs.completion_status = CompletionStatus::Completed;
        attrs.extra = extra;

        if stage == Stage::Manufacturing && factor == 0.0 {
            derive_energy_footprint(&mut attrs);
        }

        ParsedRow {
            name,
            material: self.text(row, columns::MATERIAL),
            attrs,
        }
    }
}

/// Emission factor for an energy carrier description.
#[must_use]
pub fn energy_factor(energy_type: &str) -> f64 {
    let lower = energy_type.to_lowercase();
    if lower.contains("天然气") || lower.contains("gas") {
        NATURAL_GAS_FACTOR
    } else if lower.contains('煤') || lower.contains("coal") {
        COAL_FACTOR
    } else {
        ELECTRICITY_FACTOR
    }
}

/// Manufacturing rows without a factor take their footprint from energy use.
fn derive_energy_footprint(attrs: &mut NodeAttributes) {
    let consumption = attrs
        .extra
        .get(columns::ENERGY_CONSUMPTION)
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    if consumption <= 0.0 {
        return;
    }
    let factor = energy_factor(attrs.extra_str(columns::ENERGY_TYPE).unwrap_or("电力"));
    attrs.carbon_footprint = round2(consumption * factor);
    if attrs.weight > 0.0 {
        attrs.carbon_factor = round2(attrs.carbon_footprint / attrs.weight);
    }
    attrs
        .extra
        .insert("emissionFactor".to_string(), Value::from(factor));
    attrs.capture_baseline();
}

// =============================================================================
// PLANNING
// =============================================================================

/// Parse `payload` and lay out the resulting nodes around `origin`.
///
/// `next_id` supplies fresh node ids. Nothing is committed; on error no ids
/// beyond those consumed are affected.
pub fn plan_import<F, R>(
    payload: &ImportPayload,
    origin: Position,
    layout: &LayoutConfig,
    mut next_id: F,
    rng: &mut R,
) -> Result<ImportPlan, LcaError>
where
    F: FnMut() -> NodeId,
    R: Rng + ?Sized,
{
    let table = Table::parse(&payload.text)?;
    let target = payload.target;
    let fields = columns::fields_for(target);
    let map = ColumnMap::build(&table.headers, fields);

    let required = columns::required_fields(target);
    let missing = map.missing(required);
    if !missing.is_empty() {
        return Err(LcaError::MissingRequiredColumns {
            target: target.to_string(),
            missing,
        });
    }
    let min_cells = required
        .iter()
        .filter_map(|f| map.get(f))
        .max()
        .map_or(0, |i| i + 1);

    let unit_of = |field: &str| {
        map.get(field)
            .and_then(|i| table.headers.get(i))
            .map_or(WeightUnit::Kilogram, |h| WeightUnit::from_header(h))
    };
    let weight_unit = unit_of(columns::WEIGHT);
    let per_unit_weight_unit = unit_of(columns::WEIGHT_PER_UNIT);
    let mut parser = RowParser {
        target,
        headers: &table.headers,
        map,
        fields,
        weight_unit,
        per_unit_weight_unit,
        warnings: Vec::new(),
    };

    let mut skipped_rows = 0;
    let mut parsed = Vec::new();
    for row in &table.rows {
        if row.cells.len() < min_cells {
            skipped_rows += 1;
            continue;
        }
        parsed.push(parser.parse(row));
    }
    if parsed.is_empty() {
        return Err(LcaError::NoValidRows);
    }

    let positions = match target {
        ImportTarget::Bom => {
            let mut group_names: Vec<String> = Vec::new();
            let groups: Vec<usize> = parsed
                .iter()
                .map(|row| {
                    let key = row.material.clone().unwrap_or_default();
                    match group_names.iter().position(|g| *g == key) {
                        Some(i) => i,
                        None => {
                            group_names.push(key);
                            group_names.len() - 1
                        }
                    }
                })
                .collect();
            layout::clustered_positions(&groups, group_names.len(), origin, layout, rng)
        }
        ImportTarget::Stage(_) => layout::grid_positions(parsed.len(), origin, layout, rng),
    };

    let nodes: Vec<Node> = parsed
        .into_iter()
        .zip(positions)
        .map(|(row, position)| Node::new(next_id(), row.name, position, row.attrs))
        .collect();

    let mut report = ImportReport {
        nodes_created: nodes.len(),
        skipped_rows,
        warnings: parser.warnings,
        created_node_ids: nodes.iter().map(|n| n.id.clone()).collect(),
        ..ImportReport::default()
    };

    let mut plan = ImportPlan {
        nodes,
        edges: Vec::new(),
        report: ImportReport::default(),
    };

    if target == ImportTarget::Bom {
        let final_node = final_product(&plan.nodes, payload, origin, layout, next_id());
        plan.edges = plan
            .nodes
            .iter()
            .map(|n| Edge::new(n.id.clone(), final_node.id.clone()))
            .collect();
        report.final_product = Some(final_node.id.clone());
        report.created_node_ids.push(final_node.id.clone());
        report.nodes_created += 1;
        plan.nodes.push(final_node);
    }

    report.edges_created = plan.edges.len();
    plan.report = report;
    Ok(plan)
}

/// The synthetic aggregate node of a BOM import.
///
/// Its baseline is zero: disconnected, it carries no mass of its own.
fn final_product(
    components: &[Node],
    payload: &ImportPayload,
    origin: Position,
    layout: &LayoutConfig,
    id: NodeId,
) -> Node {
    let (weight, footprint) = components.iter().fold((0.0, 0.0), |(w, f), n| {
        (w + n.attrs.weight, f + n.attrs.carbon_footprint)
    });

    let mut extra = BTreeMap::new();
    extra.insert("calculationMethod".to_string(), Value::from("累加法"));
    extra.insert(
        "productName".to_string(),
        Value::from(payload.source_name.clone()),
    );

    let attrs = NodeAttributes {
        stage: Stage::FinalProduct,
        weight: round2(weight),
        carbon_footprint: round2(footprint),
        carbon_factor: if weight > 0.0 {
            round2(footprint / weight)
        } else {
            0.0
        },
        data_source: DataSource::Aggregated,
        completion_status: CompletionStatus::Completed,
        extra,
        ..NodeAttributes::default()
    };

    Node::new(
        id,
        format!("{}-{}", Stage::FinalProduct.label(), payload.source_name),
        layout::final_product_position(origin, layout),
        attrs,
    )
}

// =============================================================================
// TESTS
// =============================================================================
