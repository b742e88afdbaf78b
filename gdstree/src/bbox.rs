//!
//! # Rectangular Bounding Boxes
//!
//! Extents of elements and structs, composed through the (linked) reference hierarchy.
//!

// Std-Lib Imports
use std::collections::{HashMap, HashSet};

// Crates.io
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Local Imports
use crate::data::*;
use crate::transform::Transform;

/// # Rectangular Bounding Box
///
/// Points `p0` and `p1` represent opposite corners of a bounding rectangle.
/// `p0` is always closest to negative-infinity, in both x and y,
/// and `p1` is always closest to positive-infinity.
///
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct BoundBox {
    pub p0: GdsPoint,
    pub p1: GdsPoint,
}
impl BoundBox {
    /// Create a new [BoundBox] from a single [GdsPoint].
    /// The resultant [BoundBox] comprises solely the point, having zero area.
    pub fn from_point(pt: &GdsPoint) -> Self {
        Self { p0: *pt, p1: *pt }
    }
    /// Create a new [BoundBox] from two corner coordinates, in any order
    pub fn from_corners(a: &GdsPoint, b: &GdsPoint) -> Self {
        Self {
            p0: GdsPoint::new(a.x.min(b.x), a.y.min(b.y)),
            p1: GdsPoint::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }
    /// Create the smallest [BoundBox] containing all of `pts`, or `None` if empty
    pub fn from_points(pts: &[GdsPoint]) -> Option<Self> {
        let (first, rest) = pts.split_first()?;
        let mut bbox = Self::from_point(first);
        for pt in rest {
            bbox.include(pt);
        }
        Some(bbox)
    }
    /// Expand to include [GdsPoint] `pt`
    pub fn include(&mut self, pt: &GdsPoint) {
        self.p0.x = self.p0.x.min(pt.x);
        self.p0.y = self.p0.y.min(pt.y);
        self.p1.x = self.p1.x.max(pt.x);
        self.p1.y = self.p1.y.max(pt.y);
    }
    /// Compute the union with rectangular bounding box `other`.
    pub fn union(&self, other: &BoundBox) -> BoundBox {
        BoundBox {
            p0: GdsPoint::new(self.p0.x.min(other.p0.x), self.p0.y.min(other.p0.y)),
            p1: GdsPoint::new(self.p1.x.max(other.p1.x), self.p1.y.max(other.p1.y)),
        }
    }
    /// Boolean indication of whether [GdsPoint] `pt` lies inside our box.
    pub fn contains(&self, pt: &GdsPoint) -> bool {
        self.p0.x <= pt.x && self.p1.x >= pt.x && self.p0.y <= pt.y && self.p1.y >= pt.y
    }
    /// Lower-left x-coordinate
    pub fn x(&self) -> i32 {
        self.p0.x
    }
    /// Lower-left y-coordinate
    pub fn y(&self) -> i32 {
        self.p0.y
    }
    /// Width, which may exceed the range of [i32]
    pub fn width(&self) -> i64 {
        i64::from(self.p1.x) - i64::from(self.p0.x)
    }
    /// Height, which may exceed the range of [i32]
    pub fn height(&self) -> i64 {
        i64::from(self.p1.y) - i64::from(self.p0.y)
    }
    /// Shift by `(dx, dy)`. Coordinates saturate at the limits of [i32].
    pub fn translate(&self, dx: i64, dy: i64) -> BoundBox {
        BoundBox {
            p0: offset(&self.p0, dx, dy),
            p1: offset(&self.p1, dx, dy),
        }
    }
    /// Bounding rectangle of our four corners, each mapped through `trans`
    pub fn transform(&self, trans: &Transform) -> BoundBox {
        let corners = [
            self.p0,
            GdsPoint::new(self.p1.x, self.p0.y),
            self.p1,
            GdsPoint::new(self.p0.x, self.p1.y),
        ];
        let mut bbox = BoundBox::from_point(&trans.apply(&corners[0]));
        for c in &corners[1..] {
            bbox.include(&trans.apply(c));
        }
        bbox
    }
}

/// Saturate `val` into the range of [i32]
fn clamp(val: i64) -> i32 {
    val.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
/// Shift `pt` by `(dx, dy)`, saturating
fn offset(pt: &GdsPoint, dx: i64, dy: i64) -> GdsPoint {
    GdsPoint::new(clamp(i64::from(pt.x) + dx), clamp(i64::from(pt.y) + dy))
}

/// Union of two optional boxes
fn union_opt(a: Option<BoundBox>, b: Option<BoundBox>) -> Option<BoundBox> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.union(&b)),
        (a, None) => a,
        (None, b) => b,
    }
}

///
/// # Bounding-Box Calculator
///
/// Computes bounding boxes of the structs of a [GdsLibrary],
/// following the resolved targets of its references.
/// Per-struct results are cached, so each struct is visited once per [GdsBboxer].
///
/// Text and node elements have no extent, and contribute nothing.
/// References which are unresolved, or whose targets no longer carry their name, contribute nothing.
///
pub struct GdsBboxer<'lib> {
    lib: &'lib GdsLibrary,
    /// Completed struct boxes
    cache: HashMap<GdsStructId, Option<BoundBox>>,
    /// Structs with a computation in progress
    pending: HashSet<GdsStructId>,
}
impl<'lib> GdsBboxer<'lib> {
    /// Create a new [GdsBboxer] over `lib`
    pub fn new(lib: &'lib GdsLibrary) -> Self {
        Self {
            lib,
            cache: HashMap::new(),
            pending: HashSet::new(),
        }
    }
    /// Bounding box of the struct with handle `id`.
    /// `None` if the struct does not exist, or if nothing in it has an extent.
    /// Fails with [GdsError::Cycle] if the struct (transitively) references itself.
    pub fn struct_bbox(&mut self, id: GdsStructId) -> GdsResult<Option<BoundBox>> {
        if let Some(cached) = self.cache.get(&id) {
            return Ok(*cached);
        }
        let lib = self.lib;
        let strukt = match lib.strukt(id) {
            Some(s) => s,
            None => return Ok(None),
        };
        if !self.pending.insert(id) {
            return Err(GdsError::Cycle(strukt.name.clone()));
        }
        let result = self.elems_bbox(&strukt.elems);
        self.pending.remove(&id);
        let bbox = result?;
        self.cache.insert(id, bbox);
        Ok(bbox)
    }
    /// Union of the boxes of all `elems`
    fn elems_bbox(&mut self, elems: &[GdsElement]) -> GdsResult<Option<BoundBox>> {
        let mut bbox = None;
        for elem in elems {
            bbox = union_opt(bbox, self.elem_bbox(elem)?);
        }
        Ok(bbox)
    }
    /// Bounding box of a single element, in its parent struct's coordinates
    pub fn elem_bbox(&mut self, elem: &GdsElement) -> GdsResult<Option<BoundBox>> {
        match elem {
            GdsElement::GdsBoundary(b) => Ok(BoundBox::from_points(&b.xy)),
            GdsElement::GdsPath(p) => Ok(path_bbox(p)),
            GdsElement::GdsStructRef(r) => self.sref_bbox(r),
            GdsElement::GdsArrayRef(r) => self.aref_bbox(r),
            GdsElement::GdsTextElem(_) | GdsElement::GdsNode(_) => Ok(None),
        }
    }
    /// Box of the struct targeted by a reference to `name`, if resolved and current
    fn target_bbox(
        &mut self,
        name: &str,
        target: Option<GdsStructId>,
    ) -> GdsResult<Option<BoundBox>> {
        let id = match target {
            Some(id) => id,
            None => return Ok(None),
        };
        let lib = self.lib;
        match lib.strukt(id) {
            Some(s) if s.name == name => self.struct_bbox(id),
            _ => {
                debug!("Ignoring stale link to struct `{}`", name);
                Ok(None)
            }
        }
    }
    fn sref_bbox(&mut self, r: &GdsStructRef) -> GdsResult<Option<BoundBox>> {
        let inner = match self.target_bbox(&r.name, r.target)? {
            Some(b) => b,
            None => return Ok(None),
        };
        let trans = Transform::from_ref(&r.xy, &r.strans, r.mag, r.angle);
        Ok(Some(inner.transform(&trans)))
    }
    fn aref_bbox(&mut self, r: &GdsArrayRef) -> GdsResult<Option<BoundBox>> {
        if r.cols <= 0 || r.rows <= 0 {
            return Ok(None);
        }
        let inner = match self.target_bbox(&r.name, r.target)? {
            Some(b) => b,
            None => return Ok(None),
        };
        let (cols, rows) = (i64::from(r.cols), i64::from(r.rows));
        let [origin, colpt, rowpt] = &r.xy;
        // Per-instance pitches, in 64 bits
        let pitch = |pt: &GdsPoint, n: i64| {
            (
                (i64::from(pt.x) - i64::from(origin.x)) / n,
                (i64::from(pt.y) - i64::from(origin.y)) / n,
            )
        };
        let col_pitch = pitch(colpt, cols);
        let row_pitch = pitch(rowpt, rows);
        // The first instance, with the shared reflect / scale / rotate stage
        let trans = Transform::from_ref(origin, &r.strans, r.mag, r.angle);
        let first = inner.transform(&trans);
        // And the three other extreme instances, by translation
        let last_col = ((cols - 1) * col_pitch.0, (cols - 1) * col_pitch.1);
        let last_row = ((rows - 1) * row_pitch.0, (rows - 1) * row_pitch.1);
        let bbox = first
            .union(&first.translate(last_col.0, last_col.1))
            .union(&first.translate(last_row.0, last_row.1))
            .union(&first.translate(last_col.0 + last_row.0, last_col.1 + last_row.1));
        Ok(Some(bbox))
    }
}

/// Bounding box of a [GdsPath].
///
/// Each horizontal or vertical segment is widened by half the path width.
/// Round and half-width-extended ends (path-types 1 and 2) further extend axis-aligned end segments.
/// Diagonal segments are not widened.
fn path_bbox(path: &GdsPath) -> Option<BoundBox> {
    let mut bbox = BoundBox::from_points(&path.xy)?;
    // Half-width, rounded up
    let hw = (i64::from(path.width).abs() + 1) / 2;
    if hw == 0 {
        return Some(bbox);
    }
    for seg in path.xy.windows(2) {
        let (a, b) = (&seg[0], &seg[1]);
        if a.y == b.y && a.x != b.x {
            for pt in seg {
                bbox.include(&offset(pt, 0, -hw));
                bbox.include(&offset(pt, 0, hw));
            }
        } else if a.x == b.x && a.y != b.y {
            for pt in seg {
                bbox.include(&offset(pt, -hw, 0));
                bbox.include(&offset(pt, hw, 0));
            }
        }
    }
    if path.path_type == 1 || path.path_type == 2 {
        let n = path.xy.len();
        if n >= 2 {
            // Start extends backwards along the first segment, end forwards along the last
            bbox.include(&extend_end(&path.xy[1], &path.xy[0], hw));
            bbox.include(&extend_end(&path.xy[n - 2], &path.xy[n - 1], hw));
        }
    }
    Some(bbox)
}

/// Extend endpoint `to` by `dist` in the direction from `from`, if the two are axis-aligned
fn extend_end(from: &GdsPoint, to: &GdsPoint, dist: i64) -> GdsPoint {
    let dx = i64::from(to.x) - i64::from(from.x);
    let dy = i64::from(to.y) - i64::from(from.y);
    if dy == 0 && dx != 0 {
        offset(to, dx.signum() * dist, 0)
    } else if dx == 0 && dy != 0 {
        offset(to, 0, dy.signum() * dist)
    } else {
        *to
    }
}

impl GdsLibrary {
    /// Create a [GdsBboxer] over this library
    pub fn bboxer(&self) -> GdsBboxer {
        GdsBboxer::new(self)
    }
    /// Bounding box of the first struct named `name`.
    /// References are followed only if resolved by [GdsLibrary::build_cell_links].
    pub fn bbox(&self, name: &str) -> GdsResult<Option<BoundBox>> {
        match self.find(name) {
            Some(id) => self.bboxer().struct_bbox(id),
            None => Ok(None),
        }
    }
}
