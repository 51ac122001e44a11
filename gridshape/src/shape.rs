/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::fmt;
use std::ops;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use crate::parse;
use crate::parse::ParseError;
use crate::parse::ParseOpts;

/// The extent of an axis that marks a shape as "don't care", see
/// [`GridShape::is_dontcare`].
pub const DONTCARE: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridShapeError {
    #[error("axis {index} out of range for shape with {num_axes} axes")]
    IndexOutOfRange { index: usize, num_axes: usize },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// The negotiation state of a [`GridShape`]. Exactly one state
/// applies to any shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ShapeState {
    /// No axes at all. Every shape starts out unspecified.
    #[default]
    Unspecified,
    /// The single axis `[DONTCARE]`: the shape is being resolved but
    /// has not been settled yet. For example, an input that was found
    /// to have no explicit configuration is marked don't-care, so
    /// that it can later take over the shape of whatever it connects
    /// to.
    DontCare,
    /// At least one axis, all of them nonzero.
    Specified,
    /// Some axis is zero, and the shape is not the don't-care marker.
    Invalid,
}

impl ShapeState {
    fn of(axes: &[u32]) -> Self {
        match axes {
            [] => ShapeState::Unspecified,
            [DONTCARE] => ShapeState::DontCare,
            axes if axes.contains(&0) => ShapeState::Invalid,
            _ => ShapeState::Specified,
        }
    }
}

impl fmt::Display for ShapeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeState::Unspecified => write!(f, "unspecified"),
            ShapeState::DontCare => write!(f, "dontcare"),
            ShapeState::Specified => write!(f, "specified"),
            ShapeState::Invalid => write!(f, "invalid"),
        }
    }
}

/// The shape of a multidimensional grid: an ordered list of axis
/// extents. Axis 0 is the one that varies fastest while iterating
/// over the grid; in 2D coordinates `(x, y)`, `x` is axis 0 and `y`
/// is axis 1.
///
/// Besides describing a grid, a shape carries the state of its own
/// negotiation (see [`ShapeState`]):
///
/// ```
/// use gridshape::GridShape;
/// use gridshape::ShapeState;
///
/// let mut s = GridShape::new();
/// assert!(s.is_unspecified());
///
/// s.mark_dontcare();
/// assert!(s.is_dontcare());
///
/// s.set_axes(vec![3, 4]);
/// assert_eq!(s.state(), ShapeState::Specified);
/// assert_eq!(s.count(), 12);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GridShape {
    axes: Vec<u32>,
    /// Always `ShapeState::of(&axes)`.
    state: ShapeState,
}

impl GridShape {
    /// Alias of the crate-level [`DONTCARE`].
    pub const DONTCARE: u32 = DONTCARE;

    /// An unspecified shape, with no axes.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_x(x: u32) -> Self {
        Self::from(vec![x])
    }

    pub fn from_xy(x: u32, y: u32) -> Self {
        Self::from(vec![x, y])
    }

    pub fn from_xyz(x: u32, y: u32, z: u32) -> Self {
        Self::from(vec![x, y, z])
    }

    /// The don't-care marker `[DONTCARE]`.
    pub fn dontcare() -> Self {
        Self::from_x(DONTCARE)
    }

    /// Parse the textual form of a shape, e.g. `[3, 4, 5]`, accepting
    /// any spelling allowed by [`ParseOpts::lenient`].
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        Self::parse_with(input, &ParseOpts::lenient())
    }

    pub fn parse_with(input: &str, opts: &ParseOpts) -> Result<Self, ParseError> {
        parse::extents(input, opts).map(Self::from)
    }

    /// Replace the axes of this shape with the ones parsed from
    /// `input`. On error the shape is left untouched.
    pub fn read_from(&mut self, input: &str) -> Result<(), ParseError> {
        let axes = parse::extents(input, &ParseOpts::lenient())?;
        self.set_axes(axes);
        Ok(())
    }

    /// Write the textual form of this shape to `sink`. This is the
    /// same text as produced by `Display`.
    pub fn write_to<W: fmt::Write>(&self, sink: &mut W) -> fmt::Result {
        write!(sink, "[")?;
        for (i, extent) in self.axes.iter().enumerate() {
            if i > 0 {
                write!(sink, ", ")?;
            }
            write!(sink, "{}", extent)?;
        }
        write!(sink, "]")
    }

    /// The number of axes.
    pub fn num_axes(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// The per-axis extents, fastest-varying first.
    pub fn axes(&self) -> &[u32] {
        &self.axes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, u32> {
        self.axes.iter()
    }

    /// The extent of axis `index`.
    pub fn axis(&self, index: usize) -> Result<u32, GridShapeError> {
        self.axes
            .get(index)
            .copied()
            .ok_or(GridShapeError::IndexOutOfRange {
                index,
                num_axes: self.axes.len(),
            })
    }

    /// The number of cells in the grid, i.e. the product of all
    /// extents, or 0 for a shape without axes.
    ///
    /// The product is computed in 64 bits. A product that does not fit
    /// saturates at `u64::MAX` rather than wrapping; use
    /// [`GridShape::checked_count`] to detect this.
    pub fn count(&self) -> u64 {
        self.checked_count().unwrap_or(u64::MAX)
    }

    /// Like [`GridShape::count`], but returns `None` on overflow.
    pub fn checked_count(&self) -> Option<u64> {
        if self.axes.is_empty() || self.axes.contains(&0) {
            return Some(0);
        }
        self.axes
            .iter()
            .try_fold(1u64, |acc, extent| acc.checked_mul(u64::from(*extent)))
    }

    pub fn state(&self) -> ShapeState {
        self.state
    }

    /// True for a shape without axes.
    pub fn is_unspecified(&self) -> bool {
        self.state == ShapeState::Unspecified
    }

    /// True for the don't-care marker `[DONTCARE]`.
    pub fn is_dontcare(&self) -> bool {
        self.state == ShapeState::DontCare
    }

    /// True if the shape has no cells. Note that this also holds for
    /// unspecified and don't-care shapes; use [`GridShape::state`] to
    /// tell those apart from a shape with a zero axis.
    pub fn is_invalid(&self) -> bool {
        !self.is_specified()
    }

    /// True if the shape has at least one cell. This is not the
    /// opposite of [`GridShape::is_unspecified`].
    pub fn is_specified(&self) -> bool {
        self.state == ShapeState::Specified
    }

    /// Replace all axes.
    pub fn set_axes(&mut self, axes: impl Into<Vec<u32>>) {
        self.axes = axes.into();
        self.update_state();
    }

    /// Set the extent of an existing axis.
    pub fn set_axis(&mut self, index: usize, extent: u32) -> Result<(), GridShapeError> {
        let num_axes = self.axes.len();
        let slot = self
            .axes
            .get_mut(index)
            .ok_or(GridShapeError::IndexOutOfRange { index, num_axes })?;
        *slot = extent;
        self.update_state();
        Ok(())
    }

    /// Append a new, slowest-varying axis.
    pub fn push_axis(&mut self, extent: u32) {
        self.axes.push(extent);
        self.update_state();
    }

    pub fn mark_dontcare(&mut self) {
        self.set_axes(vec![DONTCARE]);
    }

    pub fn mark_unspecified(&mut self) {
        self.set_axes(Vec::new());
    }

    fn update_state(&mut self) {
        self.state = ShapeState::of(&self.axes);
        tracing::trace!("grid shape {} is now {}", self, self.state);
    }
}

impl From<Vec<u32>> for GridShape {
    fn from(axes: Vec<u32>) -> Self {
        let state = ShapeState::of(&axes);
        Self { axes, state }
    }
}

impl From<&[u32]> for GridShape {
    fn from(axes: &[u32]) -> Self {
        Self::from(axes.to_vec())
    }
}

impl<const N: usize> From<[u32; N]> for GridShape {
    fn from(axes: [u32; N]) -> Self {
        Self::from(axes.to_vec())
    }
}

impl From<GridShape> for Vec<u32> {
    fn from(shape: GridShape) -> Self {
        shape.axes
    }
}

impl FromIterator<u32> for GridShape {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a> IntoIterator for &'a GridShape {
    type Item = &'a u32;
    type IntoIter = std::slice::Iter<'a, u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.axes.iter()
    }
}

/// Unchecked access to an axis extent. Panics if `index` is out of
/// range; see [`GridShape::axis`] for the checked version.
impl ops::Index<usize> for GridShape {
    type Output = u32;

    fn index(&self, index: usize) -> &u32 {
        &self.axes[index]
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_to(f)
    }
}

impl FromStr for GridShape {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// Shapes (de)serialize as a plain sequence of extents; the state is
// recomputed on the way in.

impl Serialize for GridShape {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.axes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GridShape {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<u32>::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;
    use crate::grid_shape;

    #[test]
    fn test_unspecified() {
        let s = GridShape::new();
        assert_eq!(s.num_axes(), 0);
        assert_eq!(s.state(), ShapeState::Unspecified);
        assert!(s.is_unspecified());
        assert!(!s.is_dontcare());
        assert_eq!(s.count(), 0);
        assert!(s.is_invalid());
        assert!(!s.is_specified());
        assert_eq!(s, GridShape::default());
        assert_eq!(s, GridShape::from(Vec::new()));
    }

    #[test]
    fn test_dontcare() {
        let s = GridShape::from_x(DONTCARE);
        assert_eq!(s, GridShape::dontcare());
        assert_eq!(s.state(), ShapeState::DontCare);
        assert!(s.is_dontcare());
        assert!(!s.is_unspecified());
        assert_eq!(s.count(), 0);
        assert!(s.is_invalid());
        assert!(!s.is_specified());
        assert_eq!(GridShape::DONTCARE, 0);
    }

    #[test]
    fn test_specified() {
        let s = GridShape::from_xy(3, 4);
        assert_eq!(s.num_axes(), 2);
        assert_eq!(s.axis(0).unwrap(), 3);
        assert_eq!(s.axis(1).unwrap(), 4);
        assert_eq!(s[0], 3);
        assert_eq!(s[1], 4);
        assert_eq!(s.count(), 12);
        assert_eq!(s.state(), ShapeState::Specified);
        assert!(s.is_specified());
        assert!(!s.is_invalid());
        assert!(!s.is_dontcare());
        assert!(!s.is_unspecified());

        let s = GridShape::from_x(7);
        assert_eq!(s.count(), 7);
        assert!(s.is_specified());
    }

    #[test]
    fn test_invalid() {
        let s = GridShape::from_xyz(3, 0, 5);
        assert_eq!(s.count(), 0);
        assert_eq!(s.state(), ShapeState::Invalid);
        assert!(s.is_invalid());
        assert!(!s.is_dontcare());
        assert!(!s.is_specified());
        assert!(!s.is_unspecified());

        // Two zeros is not the don't-care marker.
        let s = GridShape::from_xy(0, 0);
        assert_eq!(s.state(), ShapeState::Invalid);
        assert!(!s.is_dontcare());
    }

    #[test]
    fn test_constructors() {
        assert_eq!(GridShape::from_xyz(1, 2, 3).axes(), &[1, 2, 3]);
        assert_eq!(GridShape::from([5, 0, 2, 9]).axes(), &[5, 0, 2, 9]);
        assert_eq!(GridShape::from(&[4u32, 2][..]).axes(), &[4, 2]);
        assert_eq!((1..=4).collect::<GridShape>().count(), 24);
        assert_eq!(grid_shape![2, 8], GridShape::from_xy(2, 8));
        assert_eq!(grid_shape![], GridShape::new());

        let axes: Vec<u32> = GridShape::from_xy(6, 1).into();
        assert_eq!(axes, vec![6, 1]);
        assert_eq!(
            GridShape::from_xyz(2, 3, 4).iter().copied().collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
    }

    #[test]
    fn test_out_of_range() {
        let s = GridShape::from_xy(3, 4);
        assert_eq!(
            s.axis(2).unwrap_err(),
            GridShapeError::IndexOutOfRange {
                index: 2,
                num_axes: 2
            }
        );
        assert!(matches!(
            GridShape::new().axis(0),
            Err(GridShapeError::IndexOutOfRange { index: 0, num_axes: 0 })
        ));
    }

    #[test]
    #[should_panic]
    fn test_index_panics() {
        let s = GridShape::from_x(3);
        let _extent = s[1];
    }

    #[test]
    fn test_count_overflow() {
        let s = GridShape::from_xyz(u32::MAX, u32::MAX, 2);
        assert_eq!(s.checked_count(), None);
        assert_eq!(s.count(), u64::MAX);
        assert!(s.is_specified());

        let s = GridShape::from_xy(u32::MAX, u32::MAX);
        assert_eq!(s.checked_count(), Some(u64::from(u32::MAX) * u64::from(u32::MAX)));

        // A zero axis wins over an overflowing prefix.
        let s = GridShape::from([u32::MAX, u32::MAX, u32::MAX, 0]);
        assert!(s.is_invalid());
        assert_eq!(s.checked_count(), Some(0));
        assert_eq!(s.count(), 0);
    }

    #[test]
    fn test_mutation() {
        let mut s = GridShape::new();
        s.push_axis(3);
        assert_eq!(s.state(), ShapeState::Specified);
        s.push_axis(0);
        assert_eq!(s.state(), ShapeState::Invalid);
        s.set_axis(1, 4).unwrap();
        assert_eq!(s.count(), 12);
        assert_eq!(
            s.set_axis(2, 1).unwrap_err(),
            GridShapeError::IndexOutOfRange {
                index: 2,
                num_axes: 2
            }
        );
        assert_eq!(s.axes(), &[3, 4]);

        s.mark_dontcare();
        assert!(s.is_dontcare());
        s.mark_unspecified();
        assert!(s.is_unspecified());
        s.set_axes([2, 2, 2]);
        assert_eq!(s.count(), 8);
        s.set_axis(0, 0).unwrap();
        assert_eq!(s.state(), ShapeState::Invalid);
    }

    #[test]
    fn test_copy_independence() {
        let s = GridShape::from_xy(3, 4);
        let mut t = s.clone();
        t.set_axis(0, 9).unwrap();
        t.push_axis(2);
        assert_eq!(s.axes(), &[3, 4]);
        assert_eq!(s.count(), 12);
        assert_eq!(t.axes(), &[9, 4, 2]);
        assert_ne!(s, t);
    }

    #[test]
    fn test_display() {
        assert_eq!(GridShape::from_xyz(3, 4, 5).to_string(), "[3, 4, 5]");
        assert_eq!(GridShape::dontcare().to_string(), "[0]");
        assert_eq!(GridShape::new().to_string(), "[]");
        assert_eq!(ShapeState::DontCare.to_string(), "dontcare");

        let mut out = String::new();
        GridShape::from_xy(2, 8).write_to(&mut out).unwrap();
        assert_eq!(out, "[2, 8]");
    }

    #[test]
    fn test_roundtrip() {
        for s in [
            GridShape::from_x(1),
            GridShape::dontcare(),
            GridShape::from_xy(3, 4),
            GridShape::from_xyz(3, 0, 5),
            GridShape::from([u32::MAX, 1, 2, 3, 4]),
        ] {
            let text = s.to_string();
            assert_eq!(GridShape::parse(&text).unwrap(), s);
            assert_eq!(GridShape::parse_with(&text, &ParseOpts::strict()).unwrap(), s);
        }
    }

    #[test]
    fn test_read_from() {
        let mut s = GridShape::from_xy(3, 4);
        s.read_from("[0]").unwrap();
        assert!(s.is_dontcare());
        s.read_from(" [ 2 , 8 ] ").unwrap();
        assert_eq!(s.axes(), &[2, 8]);

        assert!(matches!(
            s.read_from("[2, 8"),
            Err(ParseError::Syntax { .. })
        ));
        assert!(matches!(
            s.read_from("[5000000000]"),
            Err(ParseError::ExtentOverflow { .. })
        ));
        assert_eq!(s.axes(), &[2, 8]);
        assert_eq!(s.state(), ShapeState::Specified);
    }

    #[test]
    fn test_from_str() {
        let s: GridShape = "[16, 16, 16]".parse().unwrap();
        assert_eq!(s.count(), 4096);
        let err: GridShapeError = "[16, x]".parse::<GridShape>().unwrap_err().into();
        assert!(matches!(err, GridShapeError::Parse(ParseError::Syntax { offset: 5, .. })));
    }

    #[test]
    fn test_serde() {
        let s = GridShape::from_xyz(3, 0, 5);
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, "[3,0,5]");

        let back: GridShape = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
        assert_eq!(back.state(), ShapeState::Invalid);

        let dontcare: GridShape = serde_json::from_str("[0]").unwrap();
        assert!(dontcare.is_dontcare());
        assert!(serde_json::from_str::<GridShape>("[-1]").is_err());
    }

    #[traced_test]
    #[test]
    fn test_state_changes_are_traced() {
        let mut s = GridShape::new();
        s.mark_dontcare();
        assert!(logs_contain("grid shape [0] is now dontcare"));
        s.set_axes(vec![3, 0]);
        assert!(logs_contain("grid shape [3, 0] is now invalid"));
    }
}
