use serde::{Deserialize, Serialize};

use super::store::DataView;

pub const DEFAULT_BENCH_COLUMN: &str = "Bench";
pub const DEFAULT_PATTERN_COLUMN: &str = "Pattern";

// ---------------------------------------------------------------------------
// Filter parameters
// ---------------------------------------------------------------------------

/// What the UI (or config file) selects.
///
/// The categorical selections are comma-separated value lists as typed by a
/// user, e.g. `"1200, 1215"`. `None` or a list without any usable value
/// places no restriction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    /// Attribute the range applies to. `None` disables the range predicate.
    pub field_to_filter: Option<String>,
    /// Half-open `[min, max)` range.
    pub range: [f64; 2],
    pub selected_blocks: Option<String>,
    pub selected_patterns: Option<String>,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            field_to_filter: None,
            range: [0.0, 1.0],
            selected_blocks: None,
            selected_patterns: None,
        }
    }
}

/// Parse a comma-separated value list. Blank tokens are skipped, unparsable
/// ones are dropped with a warning. Values are kept at f32 precision, the
/// precision attribute columns are stored in.
pub fn parse_value_list(list: &str) -> Vec<f32> {
    list.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| match token.parse::<f64>() {
            Ok(v) if !v.is_nan() => Some(v as f32),
            _ => {
                log::warn!("ignoring non-numeric filter value {token:?}");
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// FilterResult – indices in primitive-index layout
// ---------------------------------------------------------------------------

/// Indices of the points passing a filter.
///
/// Laid out like the store's primitive index buffer: slot 0 holds the count,
/// slots `1..=count` the point indices in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterResult {
    cells: Vec<u32>,
}

impl Default for FilterResult {
    fn default() -> Self {
        FilterResult { cells: vec![0] }
    }
}

impl FilterResult {
    pub fn len(&self) -> usize {
        self.cells.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matching point indices, ascending.
    pub fn indices(&self) -> &[u32] {
        &self.cells[1..]
    }

    /// Count-prefixed buffer, ready to hand to a renderer.
    pub fn as_cells(&self) -> &[u32] {
        &self.cells
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices().iter().map(|&i| i as usize)
    }
}

// ---------------------------------------------------------------------------
// RangeSetFilter
// ---------------------------------------------------------------------------

/// Range predicate on one attribute combined with set membership on the
/// bench and pattern attributes. Always recomputed from scratch.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSetFilter {
    params: FilterParams,
    bench_column: String,
    pattern_column: String,
}

impl Default for RangeSetFilter {
    fn default() -> Self {
        Self::new(FilterParams::default())
    }
}

impl RangeSetFilter {
    pub fn new(params: FilterParams) -> Self {
        RangeSetFilter {
            params,
            bench_column: DEFAULT_BENCH_COLUMN.to_string(),
            pattern_column: DEFAULT_PATTERN_COLUMN.to_string(),
        }
    }

    /// Use other attribute names for the two categorical predicates.
    pub fn with_columns(mut self, bench: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.bench_column = bench.into();
        self.pattern_column = pattern.into();
        self
    }

    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    pub fn set_params(&mut self, params: FilterParams) {
        self.params = params;
    }

    /// An empty name clears the range predicate.
    pub fn set_field_to_filter(&mut self, field: Option<&str>) {
        self.params.field_to_filter = field.filter(|f| !f.is_empty()).map(str::to_string);
    }

    pub fn set_range(&mut self, min: f64, max: f64) {
        self.params.range = [min, max];
    }

    pub fn set_min(&mut self, min: f64) {
        self.params.range[0] = min;
    }

    pub fn set_max(&mut self, max: f64) {
        self.params.range[1] = max;
    }

    pub fn set_selected_blocks(&mut self, list: Option<&str>) {
        self.params.selected_blocks = list.map(str::to_string);
    }

    pub fn set_selected_patterns(&mut self, list: Option<&str>) {
        self.params.selected_patterns = list.map(str::to_string);
    }

    /// Indices of the published points that pass every active predicate.
    ///
    /// A predicate is inactive when its attribute is missing from the store,
    /// when no range attribute is selected, or when its value set is empty.
    /// Bounds given in reverse order are swapped.
    pub fn apply(&self, view: &DataView<'_>) -> FilterResult {
        let n = view.len();

        let range_values = self
            .params
            .field_to_filter
            .as_deref()
            .and_then(|name| view.attribute(name));
        let [a, b] = self.params.range;
        let (min, max) = if a > b { (b, a) } else { (a, b) };

        let benches = self.category(view, &self.bench_column, &self.params.selected_blocks);
        let patterns = self.category(view, &self.pattern_column, &self.params.selected_patterns);

        let mut cells = Vec::with_capacity(n + 1);
        cells.push(0);
        for index in 0..n {
            let in_range = range_values.map_or(true, |column| {
                let value = f64::from(column.values[index * column.components]);
                value >= min && value < max
            });
            if in_range && benches.admits(index) && patterns.admits(index) {
                cells.push(index as u32);
            }
        }
        cells[0] = (cells.len() - 1) as u32;

        FilterResult { cells }
    }

    fn category<'v>(
        &self,
        view: &DataView<'v>,
        column: &str,
        selection: &Option<String>,
    ) -> Membership<'v> {
        let allowed = selection.as_deref().map(parse_value_list).unwrap_or_default();
        if allowed.is_empty() {
            return Membership::Any;
        }
        match view.attribute(column) {
            Some(values) => Membership::OneOf {
                values: values.values,
                stride: values.components,
                allowed,
            },
            None => Membership::Any,
        }
    }
}

enum Membership<'v> {
    Any,
    OneOf {
        values: &'v [f32],
        stride: usize,
        allowed: Vec<f32>,
    },
}

impl Membership<'_> {
    fn admits(&self, index: usize) -> bool {
        match self {
            Membership::Any => true,
            Membership::OneOf {
                values,
                stride,
                allowed,
            } => allowed.contains(&values[index * stride]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::{AttributeSpec, PointStore, StoreOptions};

    /// Store with `value`, `Bench` and `Pattern` attributes, one point per row.
    fn store(rows: &[(f64, f64, f64)]) -> PointStore {
        let mut store = PointStore::new(StoreOptions {
            initial_capacity: 2,
            growth_increment: 2,
            generate_cells: true,
        })
        .unwrap();
        store
            .configure_attributes(
                AttributeSpec::new()
                    .with("value", 1)
                    .with("Bench", 1)
                    .with("Pattern", 1),
            )
            .unwrap();
        for (i, &(value, bench, pattern)) in rows.iter().enumerate() {
            store
                .add_point(i as f64, 0.0, 0.0, &[value, bench, pattern])
                .unwrap();
        }
        store.publish();
        store.materialize();
        store
    }

    fn values(values: &[f64]) -> PointStore {
        let rows: Vec<_> = values.iter().map(|&v| (v, 1.0, 1.0)).collect();
        store(&rows)
    }

    #[test]
    fn unbounded_range_keeps_everything() {
        let store = values(&[3.0, -7.0, 1e9, 0.0]);
        let mut filter = RangeSetFilter::default();
        filter.set_field_to_filter(Some("value"));
        filter.set_range(f64::NEG_INFINITY, f64::INFINITY);

        let result = filter.apply(&store.view());
        assert_eq!(result.indices(), [0, 1, 2, 3]);
        assert_eq!(result.as_cells(), [4, 0, 1, 2, 3]);
    }

    #[test]
    fn range_is_half_open() {
        let store = values(&[5.0, 10.0, 15.0, 20.0, 25.0]);
        let mut filter = RangeSetFilter::default();
        filter.set_field_to_filter(Some("value"));
        filter.set_range(10.0, 20.0);

        let result = filter.apply(&store.view());
        assert_eq!(result.indices(), [1, 2]);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn reversed_range_is_swapped() {
        let store = values(&[5.0, 10.0, 15.0, 20.0, 25.0]);
        let mut filter = RangeSetFilter::default();
        filter.set_field_to_filter(Some("value"));
        filter.set_range(20.0, 10.0);
        assert_eq!(filter.apply(&store.view()).indices(), [1, 2]);

        filter.set_min(f64::NAN);
        assert!(filter.apply(&store.view()).is_empty());
    }

    #[test]
    fn missing_range_column_is_ignored() {
        let store = values(&[5.0, 10.0]);
        let mut filter = RangeSetFilter::default();
        filter.set_field_to_filter(Some("torque"));
        filter.set_range(100.0, 200.0);
        assert_eq!(filter.apply(&store.view()).indices(), [0, 1]);

        filter.set_field_to_filter(Some(""));
        assert_eq!(filter.params().field_to_filter, None);
        assert_eq!(filter.apply(&store.view()).len(), 2);
    }

    #[test]
    fn categorical_sets() {
        let store = store(&[
            (0.5, 1200.0, 3.0),
            (0.5, 1215.0, 3.0),
            (0.5, 1200.0, 4.0),
            (0.5, 1230.0, 4.0),
            (5.0, 1200.0, 3.0),
        ]);
        let mut filter = RangeSetFilter::default();
        filter.set_field_to_filter(Some("value"));

        filter.set_selected_blocks(Some("1200, 1230"));
        assert_eq!(filter.apply(&store.view()).indices(), [0, 2, 3]);

        filter.set_selected_patterns(Some("4"));
        assert_eq!(filter.apply(&store.view()).indices(), [2, 3]);

        filter.set_selected_blocks(Some(""));
        filter.set_selected_patterns(None);
        assert_eq!(filter.apply(&store.view()).indices(), [0, 1, 2, 3]);
    }

    #[test]
    fn categorical_sets_on_unknown_columns_are_ignored() {
        let store = values(&[1.0, 2.0]);
        let filter = RangeSetFilter::new(FilterParams {
            selected_blocks: Some("99".into()),
            ..FilterParams::default()
        })
        .with_columns("Block", "Shot");
        assert_eq!(filter.apply(&store.view()).indices(), [0, 1]);
    }

    #[test]
    fn value_lists_skip_junk() {
        assert_eq!(parse_value_list(" 1, ,2.5,abc,,3 "), [1.0, 2.5, 3.0]);
        assert!(parse_value_list(" , ").is_empty());
    }

    #[test]
    fn only_published_points_are_considered() {
        let mut store = values(&[0.5, 0.5]);
        store.add_point(9.0, 0.0, 0.0, &[0.5, 1.0, 1.0]).unwrap();

        let filter = RangeSetFilter::default();
        assert_eq!(filter.apply(&store.view()).len(), 2);

        store.publish();
        store.materialize();
        assert_eq!(filter.apply(&store.view()).len(), 3);
    }

    #[test]
    fn empty_store_yields_empty_result() {
        let store = values(&[]);
        let result = RangeSetFilter::default().apply(&store.view());
        assert!(result.is_empty());
        assert_eq!(result.as_cells(), [0]);
    }
}
