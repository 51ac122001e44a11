/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Parsing of the textual form of a [`GridShape`].
//!
//! A shape is written as a bracketed, comma-separated list of axis
//! extents, fastest-varying axis first:
//!
//! ```text
//! shape   := '[' ws ( extent ( ws ',' ws extent )* ( ws ',' )? )? ws ']'
//! extent  := [0-9]+
//! ```
//!
//! This is exactly the form produced by the `Display` impl of
//! [`GridShape`], so printing a shape and parsing it back yields an
//! equal shape.
//!
//! ```
//! use gridshape::GridShape;
//!
//! let s: GridShape = "[3, 4, 5]".parse().unwrap();
//! assert_eq!(s.axes(), &[3, 4, 5]);
//! assert_eq!(s.to_string(), "[3, 4, 5]");
//! ```
//!
//! The grammar is available as a `nom` parser ([`grid_shape`]) so
//! that collaborators can embed shapes in their own textual formats.

use nom::IResult;
use nom::character::complete::char;
use nom::character::complete::digit1;
use nom::character::complete::multispace0;
use nom::combinator::all_consuming;
use nom::combinator::map_res;
use nom::combinator::opt;
use nom::combinator::value;
use nom::multi::separated_list0;
use nom::sequence::preceded;

use crate::shape::GridShape;

/// Errors that can occur while parsing the textual form of a shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("syntax error at offset {offset} in `{input}`")]
    Syntax { input: String, offset: usize },

    #[error("extent `{text}` does not fit in 32 bits")]
    ExtentOverflow { text: String },

    #[error("empty shape not allowed")]
    Empty,
}

/// `ParseOpts` controls how permissive [`GridShape::parse_with`] is
/// about the textual form it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOpts {
    /// Accept a comma after the last extent, e.g. `[3, 4,]`.
    pub allow_trailing_comma: bool,

    /// Accept arbitrary whitespace around brackets and commas. When
    /// unset, only the canonical `", "` separator is accepted.
    pub allow_whitespace: bool,

    /// Fail on `[]`.
    pub disallow_empty: bool,
}

impl ParseOpts {
    /// Accept any reasonable spelling of a list of extents.
    pub fn lenient() -> Self {
        Self {
            allow_trailing_comma: true,
            allow_whitespace: true,
            disallow_empty: false,
        }
    }

    /// Accept only the canonical form written by `Display`.
    pub fn strict() -> Self {
        Self {
            allow_trailing_comma: false,
            allow_whitespace: false,
            ..Self::lenient()
        }
    }
}

impl Default for ParseOpts {
    fn default() -> Self {
        Self::lenient()
    }
}

fn space<'a>(opts: ParseOpts) -> impl FnMut(&'a str) -> IResult<&'a str, ()> {
    move |input| {
        if opts.allow_whitespace {
            value((), multispace0)(input)
        } else {
            Ok((input, ()))
        }
    }
}

fn separator<'a>(opts: ParseOpts) -> impl FnMut(&'a str) -> IResult<&'a str, ()> {
    move |input| {
        if opts.allow_whitespace {
            let (input, _) = space(opts)(input)?;
            let (input, _) = char(',')(input)?;
            space(opts)(input)
        } else {
            let (input, _) = char(',')(input)?;
            value((), char(' '))(input)
        }
    }
}

/// The raw digit runs of a bracketed list. Conversion to `u32` happens
/// after the grammar has matched so that overflow is reported
/// separately from syntax errors.
fn digit_runs<'a>(opts: ParseOpts) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<&'a str>> {
    move |input| {
        let (input, _) = space(opts)(input)?;
        let (input, _) = char('[')(input)?;
        let (input, _) = space(opts)(input)?;
        let (input, runs) = separated_list0(separator(opts), digit1)(input)?;
        let (input, _) = if opts.allow_trailing_comma && !runs.is_empty() {
            opt(preceded(space(opts), char(',')))(input)?
        } else {
            (input, None)
        };
        let (input, _) = space(opts)(input)?;
        let (input, _) = char(']')(input)?;
        let (input, _) = space(opts)(input)?;
        Ok((input, runs))
    }
}

/// A `nom` parser for a shape in lenient syntax. Extents that overflow
/// `u32` fail the parse. Trailing input is left unconsumed.
pub fn grid_shape(input: &str) -> IResult<&str, GridShape> {
    map_res(digit_runs(ParseOpts::lenient()), |runs: Vec<&str>| {
        runs.into_iter()
            .map(str::parse::<u32>)
            .collect::<Result<Vec<_>, _>>()
            .map(GridShape::from)
    })(input)
}

/// Parse the whole of `input` as a list of extents.
pub(crate) fn extents(input: &str, opts: &ParseOpts) -> Result<Vec<u32>, ParseError> {
    let result = match all_consuming(digit_runs(*opts))(input) {
        Ok((_, runs)) => convert(runs, opts),
        Err(nom::Err::Error(err) | nom::Err::Failure(err)) => Err(ParseError::Syntax {
            input: input.to_string(),
            offset: input.len() - err.input.len(),
        }),
        Err(nom::Err::Incomplete(_)) => Err(ParseError::Syntax {
            input: input.to_string(),
            offset: input.len(),
        }),
    };
    if let Err(err) = &result {
        tracing::debug!("failed to parse grid shape `{}`: {}", input, err);
    }
    result
}

fn convert(runs: Vec<&str>, opts: &ParseOpts) -> Result<Vec<u32>, ParseError> {
    if runs.is_empty() && opts.disallow_empty {
        return Err(ParseError::Empty);
    }
    runs.into_iter()
        .map(|text| {
            text.parse::<u32>()
                .map_err(|_| ParseError::ExtentOverflow {
                    text: text.to_string(),
                })
        })
        .collect()
}
