use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_INITIAL_CAPACITY: usize = 200_000;
pub const DEFAULT_GROWTH_INCREMENT: usize = 100_000;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Sizing of the point buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Slots allocated up front.
    pub initial_capacity: usize,
    /// Slots added each time the buffers are full. Fixed, not doubling.
    pub growth_increment: usize,
    /// Maintain a `[count, 0, 1, .., capacity - 1]` primitive index buffer.
    pub generate_cells: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            growth_increment: DEFAULT_GROWTH_INCREMENT,
            generate_cells: false,
        }
    }
}

/// Attribute name → component count, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSpec {
    entries: Vec<(String, usize)>,
}

impl AttributeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, components: usize) -> Self {
        self.insert(name, components);
        self
    }

    /// Add an attribute, or change the component count of an existing one
    /// while keeping its position. Zero components is treated as one.
    pub fn insert(&mut self, name: impl Into<String>, components: usize) {
        let name = name.into();
        let components = components.max(1);
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = components,
            None => self.entries.push((name, components)),
        }
    }

    pub fn components(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| *c)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), *c))
    }

    /// Total components per point, i.e. the length of a flat value row.
    pub fn width(&self) -> usize {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for AttributeSpec {
    fn from_iter<I: IntoIterator<Item = (S, usize)>>(iter: I) -> Self {
        let mut spec = AttributeSpec::new();
        for (name, components) in iter {
            spec.insert(name, components);
        }
        spec
    }
}

// ---------------------------------------------------------------------------
// PointStore
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct AttributeColumn {
    name: String,
    components: usize,
    data: Vec<f32>,
}

/// Growable columnar point buffers.
///
/// Points are appended one at a time behind a write cursor. Consumers only
/// ever see the prefix up to the *published* count, which moves forward in
/// [`materialize`](Self::materialize). Coordinates are stored relative to the
/// first accepted point.
#[derive(Debug)]
pub struct PointStore {
    options: StoreOptions,
    capacity: usize,
    point_count: usize,
    output_point_count: usize,
    center: Option<[f64; 3]>,
    coordinates: Vec<f64>,
    cells: Option<Vec<u32>>,
    columns: Vec<AttributeColumn>,
    spec: AttributeSpec,
    modified: bool,
    generation: u64,
}

impl PointStore {
    pub fn new(options: StoreOptions) -> Result<Self> {
        if options.growth_increment == 0 {
            return Err(Error::ZeroGrowthIncrement);
        }
        let mut store = PointStore {
            options,
            capacity: 0,
            point_count: 0,
            output_point_count: 0,
            center: None,
            coordinates: Vec::new(),
            cells: options.generate_cells.then(Vec::new),
            columns: Vec::new(),
            spec: AttributeSpec::new(),
            modified: false,
            generation: 0,
        };
        store.resize(options.initial_capacity)?;
        Ok(store)
    }

    /// Replace the attribute layout.
    ///
    /// New names get a zero-filled column sized to the current capacity.
    /// A name whose component count changed is reallocated the same way.
    /// Columns that no longer appear in the layout are released; all others
    /// keep their contents.
    pub fn configure_attributes(&mut self, spec: AttributeSpec) -> Result<()> {
        // Allocate everything new before touching the current columns, so a
        // failed allocation leaves the store as it was.
        // Ok: newly allocated data, Err: index of the column kept as is.
        let mut fresh: Vec<std::result::Result<Vec<f32>, usize>> = Vec::with_capacity(spec.len());
        for (name, components) in spec.iter() {
            let kept = self
                .columns
                .iter()
                .position(|c| c.name == name && c.components == components);
            if let Some(i) = kept {
                fresh.push(Err(i));
                continue;
            }
            log::debug!("allocating attribute column {name:?} ({components} components)");
            let mut data = Vec::new();
            extend_zeroed(&mut data, slots(self.capacity, components)?, self.capacity)?;
            fresh.push(Ok(data));
        }

        let columns: Vec<AttributeColumn> = spec
            .iter()
            .zip(fresh)
            .map(|((name, components), data)| AttributeColumn {
                name: name.to_string(),
                components,
                data: data.unwrap_or_else(|i| std::mem::take(&mut self.columns[i].data)),
            })
            .collect();

        self.columns = columns;
        self.spec = spec;
        Ok(())
    }

    /// Append one point.
    ///
    /// `values` holds the attribute components flattened in layout order. A
    /// short row is allowed: missing vector components become 0, a missing
    /// scalar becomes `NaN`. NaN vector components are also stored as 0.
    ///
    /// Returns `Ok(false)` and leaves the store untouched when any coordinate
    /// is NaN.
    pub fn add_point(&mut self, x: f64, y: f64, z: f64, values: &[f64]) -> Result<bool> {
        if x.is_nan() || y.is_nan() || z.is_nan() {
            return Ok(false);
        }

        if self.point_count == self.capacity {
            let grown = self
                .capacity
                .checked_add(self.options.growth_increment)
                .ok_or(Error::CapacityOverflow(self.capacity))?;
            self.resize(grown)?;
        }

        let center = *self.center.get_or_insert([x, y, z]);
        let slot = self.point_count;
        self.coordinates[slot * 3] = x - center[0];
        self.coordinates[slot * 3 + 1] = y - center[1];
        self.coordinates[slot * 3 + 2] = z - center[2];

        let mut offset = 0;
        for column in &mut self.columns {
            let n = column.components;
            let start = slot * n;
            if n > 1 {
                for j in 0..n {
                    let value = values
                        .get(offset + j)
                        .copied()
                        .filter(|v| !v.is_nan())
                        .unwrap_or(0.0);
                    column.data[start + j] = value as f32;
                }
            } else {
                column.data[start] = values.get(offset).copied().unwrap_or(f64::NAN) as f32;
            }
            offset += n;
        }

        self.point_count += 1;
        Ok(true)
    }

    /// Flag a pending visibility update when unpublished points exist.
    /// Returns whether the store is now marked modified.
    pub fn publish(&mut self) -> bool {
        if self.point_count != self.output_point_count {
            self.modified = true;
        }
        self.modified
    }

    /// Make every written point visible and return the published view.
    pub fn materialize(&mut self) -> DataView<'_> {
        self.output_point_count = self.point_count;
        if let Some(cells) = &mut self.cells {
            // Capacity is bounded by the u32 check in `resize`.
            cells[0] = self.output_point_count as u32;
        }
        self.modified = false;
        self.view()
    }

    /// The current published window, without publishing anything new.
    pub fn view(&self) -> DataView<'_> {
        DataView {
            store: self,
            len: self.output_point_count,
        }
    }

    /// Attribute names in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.spec.names()
    }

    pub fn attribute_spec(&self) -> &AttributeSpec {
        &self.spec
    }

    /// Published point count.
    pub fn number_of_points(&self) -> usize {
        self.output_point_count
    }

    /// Points written so far, published or not.
    pub fn pending_points(&self) -> usize {
        self.point_count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Raw coordinates of the first accepted point.
    pub fn center(&self) -> Option<[f64; 3]> {
        self.center
    }

    /// Incremented each time the buffers are reallocated.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    fn resize(&mut self, capacity: usize) -> Result<()> {
        if let Some(cells) = &mut self.cells {
            if capacity >= u32::MAX as usize {
                return Err(Error::CapacityOverflow(capacity));
            }
            let start = cells.len();
            extend_zeroed(cells, capacity + 1, capacity)?;
            for (i, cell) in cells.iter_mut().enumerate().skip(start.max(1)) {
                *cell = (i - 1) as u32;
            }
        }

        extend_zeroed(&mut self.coordinates, slots(capacity, 3)?, capacity)?;
        for column in &mut self.columns {
            extend_zeroed(&mut column.data, slots(capacity, column.components)?, capacity)?;
        }

        if self.capacity != 0 {
            log::debug!("point store grown from {} to {capacity} slots", self.capacity);
        }
        self.capacity = capacity;
        self.generation += 1;
        Ok(())
    }
}

/// Buffer length for `capacity` points of `width` values each.
fn slots(capacity: usize, width: usize) -> Result<usize> {
    capacity
        .checked_mul(width)
        .ok_or(Error::CapacityOverflow(capacity))
}

/// Grow `buffer` to `len` zeroed elements, reporting allocation failure
/// instead of aborting.
fn extend_zeroed<T: Copy + Default>(buffer: &mut Vec<T>, len: usize, slots: usize) -> Result<()> {
    let additional = len.saturating_sub(buffer.len());
    buffer
        .try_reserve_exact(additional)
        .map_err(|_| Error::OutOfMemory { requested: slots })?;
    buffer.resize(len, T::default());
    Ok(())
}

// ---------------------------------------------------------------------------
// DataView – the published window
// ---------------------------------------------------------------------------

/// Read-only window over the first `len` published points.
///
/// Borrowing the store keeps the window from outliving a reallocation.
#[derive(Debug, Clone, Copy)]
pub struct DataView<'a> {
    store: &'a PointStore,
    len: usize,
}

/// One attribute column restricted to the published points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeView<'a> {
    pub name: &'a str,
    pub components: usize,
    pub values: &'a [f32],
}

impl AttributeView<'_> {
    /// Component `component` of point `index`.
    pub fn get(&self, index: usize, component: usize) -> Option<f32> {
        if component >= self.components {
            return None;
        }
        self.values.get(index * self.components + component).copied()
    }

    /// Min/max of one component, ignoring NaN. `None` when no finite value
    /// exists.
    pub fn range(&self, component: usize) -> Option<(f32, f32)> {
        if component >= self.components {
            return None;
        }
        self.values
            .iter()
            .skip(component)
            .step_by(self.components)
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Axis-aligned extent of a set of points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointCloudBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
}

impl PointCloudBounds {
    pub fn center(&self) -> [f64; 3] {
        [
            (self.max_x + self.min_x) * 0.5,
            (self.max_y + self.min_y) * 0.5,
            (self.max_z + self.min_z) * 0.5,
        ]
    }

    pub fn size(&self) -> [f64; 3] {
        [
            self.max_x - self.min_x,
            self.max_y - self.min_y,
            self.max_z - self.min_z,
        ]
    }

    /// Shift by `offset`, e.g. from store-relative to raw coordinates.
    pub fn translated(&self, offset: [f64; 3]) -> Self {
        PointCloudBounds {
            min_x: self.min_x + offset[0],
            max_x: self.max_x + offset[0],
            min_y: self.min_y + offset[1],
            max_y: self.max_y + offset[1],
            min_z: self.min_z + offset[2],
            max_z: self.max_z + offset[2],
        }
    }
}

/// Everything known about one published point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointInfo {
    pub index: usize,
    /// Store-relative position.
    pub position: [f64; 3],
    /// Position in the input's coordinate system.
    pub absolute_position: [f64; 3],
    pub attributes: Vec<(String, Vec<f32>)>,
}

impl<'a> DataView<'a> {
    /// Published point count.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `3 × len` store-relative coordinates.
    pub fn coordinates(&self) -> &'a [f64] {
        &self.store.coordinates[..self.len * 3]
    }

    /// `len + 1` primitive indices, slot 0 holding `len`. Present only when
    /// cell generation is enabled.
    pub fn cells(&self) -> Option<&'a [u32]> {
        self.store.cells.as_deref().map(|cells| &cells[..self.len + 1])
    }

    pub fn attribute(&self, name: &str) -> Option<AttributeView<'a>> {
        self.store
            .columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| self.column_view(c))
    }

    /// All attribute columns in insertion order.
    pub fn attributes(&self) -> impl Iterator<Item = AttributeView<'a>> + 'a {
        let len = self.len;
        self.store.columns.iter().map(move |c| AttributeView {
            name: &c.name,
            components: c.components,
            values: &c.data[..len * c.components],
        })
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'a str> {
        self.store.spec.names()
    }

    pub fn center(&self) -> Option<[f64; 3]> {
        self.store.center
    }

    pub fn generation(&self) -> u64 {
        self.store.generation
    }

    pub fn position(&self, index: usize) -> Option<[f64; 3]> {
        if index >= self.len {
            return None;
        }
        let c = &self.store.coordinates[index * 3..index * 3 + 3];
        Some([c[0], c[1], c[2]])
    }

    /// Store-relative bounds of the published points.
    pub fn bounds(&self) -> Option<PointCloudBounds> {
        let mut points = self.coordinates().chunks_exact(3);
        let first = points.next()?;
        let mut bounds = PointCloudBounds {
            min_x: first[0],
            max_x: first[0],
            min_y: first[1],
            max_y: first[1],
            min_z: first[2],
            max_z: first[2],
        };
        for p in points {
            bounds.min_x = bounds.min_x.min(p[0]);
            bounds.max_x = bounds.max_x.max(p[0]);
            bounds.min_y = bounds.min_y.min(p[1]);
            bounds.max_y = bounds.max_y.max(p[1]);
            bounds.min_z = bounds.min_z.min(p[2]);
            bounds.max_z = bounds.max_z.max(p[2]);
        }
        Some(bounds)
    }

    /// Position and every attribute value of one point.
    pub fn point(&self, index: usize) -> Option<PointInfo> {
        let position = self.position(index)?;
        let center = self.store.center.unwrap_or_default();
        let attributes = self
            .attributes()
            .map(|a| {
                let start = index * a.components;
                (a.name.to_string(), a.values[start..start + a.components].to_vec())
            })
            .collect();
        Some(PointInfo {
            index,
            position,
            absolute_position: [
                position[0] + center[0],
                position[1] + center[1],
                position[2] + center[2],
            ],
            attributes,
        })
    }

    fn column_view(&self, column: &'a AttributeColumn) -> AttributeView<'a> {
        AttributeView {
            name: &column.name,
            components: column.components,
            values: &column.data[..self.len * column.components],
        }
    }
}
