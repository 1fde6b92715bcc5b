//! # Engine Primitives
//!
//! Fixed constants and numeric helpers for the Carbonflow engine.
//!
//! Values here are compiled in. Anything a deployment may want to tune
//! (layout spacing, propagation) is surfaced again through the store settings.

// =============================================================================
// ROUNDING
// =============================================================================

/// Derived totals are kept at two decimal places.
///
/// Repeated aggregation would otherwise accumulate floating-point drift.
pub const ROUNDING_SCALE: f64 = 100.0;

/// Round to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    let rounded = (value * ROUNDING_SCALE).round() / ROUNDING_SCALE;
    // Normalize -0.0 so equality checks and JSON output stay clean.
    if rounded == 0.0 { 0.0 } else { rounded }
}

// =============================================================================
// CREDIBILITY
// =============================================================================

/// AI-supplemented nodes above this uncertainty score need user follow-up.
pub const UNCERTAIN_AI_THRESHOLD: f64 = 10.0;

/// Upper bound of an uncertainty score.
pub const MAX_UNCERTAINTY: f64 = 100.0;

// =============================================================================
// IMPORT LAYOUT
// =============================================================================

/// Nodes per row when laying out imported lifecycle rows.
pub const DEFAULT_COLUMNS_PER_ROW: usize = 3;

/// Horizontal distance between grid cells.
pub const DEFAULT_HORIZONTAL_SPACING: f64 = 300.0;

/// Vertical distance between grid rows.
pub const DEFAULT_VERTICAL_SPACING: f64 = 250.0;

/// Maximum horizontal jitter applied to imported nodes.
pub const DEFAULT_JITTER_X: f64 = 30.0;

/// Maximum vertical jitter applied to imported nodes.
pub const DEFAULT_JITTER_Y: f64 = 20.0;

/// Material clusters are spread this many grid cells apart.
pub const MATERIAL_GROUP_SPREAD: f64 = 1.5;

/// Seed for the layout RNG when none is configured.
pub const DEFAULT_LAYOUT_SEED: u64 = 0x00C0_FFEE;

// =============================================================================
// CANVAS
// =============================================================================

/// A stage template's carbon factor is its default footprint over this.
pub const TEMPLATE_FACTOR_DIVISOR: f64 = 10.0;

/// A duplicated node lands this far right of and below its original.
pub const DUPLICATE_OFFSET: f64 = 50.0;

/// Top-left corner of the stage-column layout.
pub const AUTO_LAYOUT_ORIGIN_X: f64 = 100.0;
pub const AUTO_LAYOUT_ORIGIN_Y: f64 = 100.0;

/// Distance between stage columns.
pub const AUTO_LAYOUT_COLUMN_SPACING: f64 = 400.0;

/// Distance between nodes within a stage column.
pub const AUTO_LAYOUT_ROW_SPACING: f64 = 300.0;

// =============================================================================
// ENERGY EMISSION FACTORS (kgCO2e per kWh-equivalent)
// =============================================================================

/// Grid electricity.
pub const ELECTRICITY_FACTOR: f64 = 0.5839;

/// Natural gas.
pub const NATURAL_GAS_FACTOR: f64 = 0.202;

/// Coal.
pub const COAL_FACTOR: f64 = 2.93;

// =============================================================================
// SUMMARY
// =============================================================================

/// Number of hotspot nodes reported in a workflow summary.
pub const HOTSPOT_LIMIT: usize = 5;

/// Share of data completeness in the overall data quality score.
pub const QUALITY_COMPLETENESS_WEIGHT: f64 = 0.4;

/// Share of the primary data rate in the overall data quality score.
pub const QUALITY_PRIMARY_WEIGHT: f64 = 0.3;

/// Share of the verified data rate in the overall data quality score.
pub const QUALITY_VERIFIED_WEIGHT: f64 = 0.3;

/// Default bound on retained history entries.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;
