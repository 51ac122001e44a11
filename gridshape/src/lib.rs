/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Shapes of multidimensional grids.
//!
//! Provides [`GridShape`], an ordered list of per-axis extents
//! together with the sentinel states (see [`ShapeState`]) used while
//! producers and consumers of a grid negotiate its shape.
//!
//! The crate only describes shapes; it does not implement the
//! negotiation itself.

/// Parsing of the textual form of shapes.
pub mod parse;

/// The [`GridShape`] type and its negotiation states.
pub mod shape;

/// Options controlling how strictly shapes are parsed.
pub use parse::ParseOpts;
/// Errors that can occur while parsing a shape.
pub use parse::ParseError;
/// The axis extent used to build the don't-care marker.
pub use shape::DONTCARE;
/// The shape of a multidimensional grid.
pub use shape::GridShape;
/// Errors that can occur when accessing a shape.
pub use shape::GridShapeError;
/// The negotiation state of a shape.
pub use shape::ShapeState;

/// Construct a new shape from the given axis extents, fastest-varying
/// axis first.
///
/// ```
/// let s = gridshape::grid_shape![2, 8];
/// assert_eq!(s.axes(), &[2, 8]);
/// assert_eq!(s.count(), 16);
///
/// assert!(gridshape::grid_shape![].is_unspecified());
/// assert!(gridshape::grid_shape![gridshape::DONTCARE].is_dontcare());
/// ```
#[macro_export]
macro_rules! grid_shape {
    ( $( $extent:expr ),* $(,)? ) => {
        {
            let axes: ::std::vec::Vec<u32> = ::std::vec![ $( $extent ),* ];
            $crate::shape::GridShape::from(axes)
        }
    };
}
