//! Header keyword tables and column mapping.
//!
//! Each import target has a fixed table of fields. A field maps to the first
//! header (left to right) containing any of its keywords as a case-sensitive
//! substring.

use super::ImportTarget;
use crate::Stage;
use std::collections::BTreeMap;

/// Canonical field names shared by every table.
pub const NAME: &str = "name";
pub const WEIGHT: &str = "weight";
pub const CARBON_FACTOR: &str = "carbonFactor";
pub const MATERIAL: &str = "material";
pub const QUANTITY: &str = "quantity";
pub const WEIGHT_PER_UNIT: &str = "weight_per_unit";
pub const ENERGY_CONSUMPTION: &str = "energyConsumption";
pub const ENERGY_TYPE: &str = "energyType";

/// How a cell is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Text,
}

/// One importable field and the header keywords that identify it.
///
/// A header containing any `exclude` marker never matches, even when a
/// keyword does (`单位重量` is not a total weight).
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub exclude: &'static [&'static str],
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Whether a header cell identifies this field.
    #[must_use]
    pub fn matches(&self, header: &str) -> bool {
        self.keywords.iter().any(|k| header.contains(k))
            && !self.exclude.iter().any(|x| header.contains(x))
    }

    const fn excluding(self, exclude: &'static [&'static str]) -> Self {
        Self { exclude, ..self }
    }
}

const fn number(name: &'static str, keywords: &'static [&'static str]) -> FieldSpec {
    FieldSpec {
        name,
        keywords,
        exclude: &[],
        kind: FieldKind::Number,
    }
}

const fn text(name: &'static str, keywords: &'static [&'static str]) -> FieldSpec {
    FieldSpec {
        name,
        keywords,
        exclude: &[],
        kind: FieldKind::Text,
    }
}

// =============================================================================
// KEYWORD TABLES
// =============================================================================

const WEIGHT_KEYWORDS: &[&str] = &["重量", "weight", "Weight"];
const PER_UNIT_MARKERS: &[&str] = &["单位重量", "weight_per_unit"];
const FACTOR_KEYWORDS: &[&str] = &["碳排放因子", "碳因子", "carbon_factor", "carbonFactor"];

const BOM_FIELDS: &[FieldSpec] = &[
    text("componentId", &["ID", "编号", "Id"]),
    text(NAME, &["名称", "组件名", "name", "Name"]),
    text(MATERIAL, &["材料", "类型", "material", "Material"]),
    number(WEIGHT, WEIGHT_KEYWORDS).excluding(PER_UNIT_MARKERS),
    text("supplier", &["供应", "supplier", "Supplier"]),
    number(CARBON_FACTOR, FACTOR_KEYWORDS),
    number(QUANTITY, &["数量", "quantity", "Quantity"]),
    number(WEIGHT_PER_UNIT, PER_UNIT_MARKERS),
];

const RAW_MATERIAL_FIELDS: &[FieldSpec] = &[
    text(NAME, &["名称", "材料", "name"]),
    number(WEIGHT, WEIGHT_KEYWORDS),
    number(CARBON_FACTOR, FACTOR_KEYWORDS),
    text("supplier", &["供应", "supplier"]),
    text(MATERIAL, &["类型", "material"]),
];

const MANUFACTURING_FIELDS: &[FieldSpec] = &[
    text(NAME, &["名称", "工序名"]),
    number(WEIGHT, WEIGHT_KEYWORDS),
    number(CARBON_FACTOR, FACTOR_KEYWORDS),
    number(ENERGY_CONSUMPTION, &["能耗", "能源消耗"]),
    text(ENERGY_TYPE, &["能源类型"]),
    number("processEfficiency", &["效率"]),
    number("wasteGeneration", &["废物"]),
    number("waterConsumption", &["用水", "水耗"]),
];

const DISTRIBUTION_FIELDS: &[FieldSpec] = &[
    text(NAME, &["名称", "地点", "仓库", "物品"]),
    number(WEIGHT, WEIGHT_KEYWORDS),
    number(CARBON_FACTOR, FACTOR_KEYWORDS),
    text("transportationMode", &["运输方式"]),
    number("transportationDistance", &["距离"]),
    text("startPoint", &["起点"]),
    text("endPoint", &["终点"]),
    text("vehicleType", &["车辆"]),
    text("fuelType", &["燃料"]),
];

const USAGE_FIELDS: &[FieldSpec] = &[
    text(NAME, &["名称", "产品", "型号"]),
    number(WEIGHT, WEIGHT_KEYWORDS),
    number(CARBON_FACTOR, FACTOR_KEYWORDS),
    number("lifespan", &["寿命"]),
    number("energyConsumptionPerUse", &["单次能耗"]),
    number("usageFrequency", &["频率"]),
    text("usageLocation", &["地区", "位置"]),
];

const DISPOSAL_FIELDS: &[FieldSpec] = &[
    text(NAME, &["名称", "处置方法", "废弃物"]),
    number(WEIGHT, WEIGHT_KEYWORDS),
    number(CARBON_FACTOR, FACTOR_KEYWORDS),
    number("recyclingRate", &["回收率"]),
    number("landfillPercentage", &["填埋"]),
    number("incinerationPercentage", &["焚烧"]),
    text("disposalMethod", &["方式"]),
];

/// Field table for an import target.
#[must_use]
pub fn fields_for(target: ImportTarget) -> &'static [FieldSpec] {
    match target {
        ImportTarget::Bom => BOM_FIELDS,
        ImportTarget::Stage(Stage::Manufacturing) => MANUFACTURING_FIELDS,
        ImportTarget::Stage(Stage::Distribution) => DISTRIBUTION_FIELDS,
        ImportTarget::Stage(Stage::Usage) => USAGE_FIELDS,
        ImportTarget::Stage(Stage::Disposal) => DISPOSAL_FIELDS,
        ImportTarget::Stage(_) => RAW_MATERIAL_FIELDS,
    }
}

/// Fields that must be mapped for the import to proceed.
#[must_use]
pub fn required_fields(target: ImportTarget) -> &'static [&'static str] {
    match target {
        ImportTarget::Bom => &[NAME, WEIGHT, CARBON_FACTOR],
        ImportTarget::Stage(_) => &[NAME],
    }
}

// =============================================================================
// COLUMN MAP
// =============================================================================

/// Field name -> header column index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    indices: BTreeMap<&'static str, usize>,
}

impl ColumnMap {
    /// Map every field in `fields` against `headers`.
    #[must_use]
    pub fn build(headers: &[String], fields: &[FieldSpec]) -> Self {
        let indices = fields
            .iter()
            .filter_map(|field| {
                headers
                    .iter()
                    .position(|h| field.matches(h))
                    .map(|index| (field.name, index))
            })
            .collect();
        Self { indices }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<usize> {
        self.indices.get(field).copied()
    }

    /// Required fields with no column.
    #[must_use]
    pub fn missing(&self, required: &[&'static str]) -> Vec<String> {
        required
            .iter()
            .filter(|f| !self.indices.contains_key(*f))
            .map(|f| (*f).to_string())
            .collect()
    }
}

// =============================================================================
// WEIGHT UNITS
// =============================================================================

/// Mass unit declared in a weight header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightUnit {
    Kilogram,
    Gram,
    Tonne,
}

impl WeightUnit {
    /// Infer the unit from header text. Kilogram wins over gram markers.
    #[must_use]
    pub fn from_header(header: &str) -> Self {
        let lower = header.to_lowercase();
        let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

        if has(&["kg", "千克", "公斤", "kilogram"]) {
            Self::Kilogram
        } else if has(&["(g)", "（g）", "[g]", "克", "gram"]) {
            Self::Gram
        } else if has(&["(t)", "（t）", "吨", "tonne"]) {
            Self::Tonne
        } else {
            Self::Kilogram
        }
    }

    /// Convert a value in this unit to kilograms.
    #[must_use]
    pub fn to_kg(self, value: f64) -> f64 {
        match self {
            Self::Kilogram => value,
            Self::Gram => value / 1000.0,
            Self::Tonne => value * 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| (*c).to_string()).collect()
    }

    #[test]
    fn bom_header_maps_by_substring() {
        let h = headers(&["组件ID", "组件名称", "重量(g)", "碳排放因子(kgCO2e/kg)"]);
        let map = ColumnMap::build(&h, fields_for(ImportTarget::Bom));
        assert_eq!(map.get("componentId"), Some(0));
        assert_eq!(map.get(NAME), Some(1));
        assert_eq!(map.get(WEIGHT), Some(2));
        assert_eq!(map.get(CARBON_FACTOR), Some(3));
        assert!(map.missing(required_fields(ImportTarget::Bom)).is_empty());
    }

    #[test]
    fn first_matching_column_wins() {
        let h = headers(&["名称", "重量(kg)", "毛重量(kg)"]);
        let map = ColumnMap::build(&h, fields_for(ImportTarget::Stage(Stage::Usage)));
        assert_eq!(map.get(WEIGHT), Some(1));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let h = headers(&["NAME", "WEIGHT"]);
        let map = ColumnMap::build(&h, fields_for(ImportTarget::Bom));
        assert_eq!(
            map.missing(required_fields(ImportTarget::Bom)),
            vec!["name", "weight", "carbonFactor"]
        );
    }

    #[test]
    fn unit_weight_is_not_total_weight() {
        let h = headers(&["名称", "单位重量(g)", "重量(kg)", "碳因子"]);
        let map = ColumnMap::build(&h, fields_for(ImportTarget::Bom));
        assert_eq!(map.get(WEIGHT), Some(2));
        assert_eq!(map.get(WEIGHT_PER_UNIT), Some(1));
    }

    #[test]
    fn weight_units() {
        assert_eq!(WeightUnit::from_header("重量(g)"), WeightUnit::Gram);
        assert_eq!(WeightUnit::from_header("重量(kg)"), WeightUnit::Kilogram);
        assert_eq!(WeightUnit::from_header("重量（千克）"), WeightUnit::Kilogram);
        assert_eq!(WeightUnit::from_header("weight"), WeightUnit::Kilogram);
        assert_eq!(WeightUnit::from_header("重量(吨)"), WeightUnit::Tonne);
        assert!((WeightUnit::Gram.to_kg(1500.0) - 1.5).abs() < 1e-12);
    }
}
