//! Relative-direction selectors
//!
//! A selector such as `F1+U2+R-1` names a cell relative to the actor. It is
//! resolved against the actor's heading at evaluation time, so the same
//! selector maps to different world offsets depending on orientation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg};

/* ===================== Heading ===================== */

/// Cardinal heading. North is +Z, east is +X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Heading {
    North,
    East,
    South,
    West,
}

impl Heading {
    pub const ALL: [Heading; 4] = [Heading::North, Heading::East, Heading::South, Heading::West];

    /// Unit forward vector on the XZ plane
    pub fn forward(self) -> Offset {
        match self {
            Heading::North => Offset::new(0, 0, 1),
            Heading::East => Offset::new(1, 0, 0),
            Heading::South => Offset::new(0, 0, -1),
            Heading::West => Offset::new(-1, 0, 0),
        }
    }

    /// Unit right vector (forward rotated 90 degrees clockwise)
    pub fn right(self) -> Offset {
        self.turn_right().forward()
    }

    pub fn turn_right(self) -> Heading {
        match self {
            Heading::North => Heading::East,
            Heading::East => Heading::South,
            Heading::South => Heading::West,
            Heading::West => Heading::North,
        }
    }

    pub fn turn_left(self) -> Heading {
        self.turn_right().turn_right().turn_right()
    }

    pub fn reverse(self) -> Heading {
        self.turn_right().turn_right()
    }

    /// Yaw in radians for this heading. South is 0, increasing clockwise.
    pub fn yaw(self) -> f64 {
        use std::f64::consts::FRAC_PI_2;
        match self {
            Heading::South => 0.0,
            Heading::West => FRAC_PI_2,
            Heading::North => 2.0 * FRAC_PI_2,
            Heading::East => 3.0 * FRAC_PI_2,
        }
    }

    /// Snap an arbitrary yaw to the nearest cardinal heading
    pub fn from_yaw(yaw: f64) -> Heading {
        use std::f64::consts::{FRAC_PI_2, TAU};
        let normalized = yaw.rem_euclid(TAU);
        let sector = ((normalized + FRAC_PI_2 / 2.0) / FRAC_PI_2).floor() as i64 % 4;
        match sector {
            0 => Heading::South,
            1 => Heading::West,
            2 => Heading::North,
            _ => Heading::East,
        }
    }

    pub fn parse(name: &str) -> Option<Heading> {
        match name.to_ascii_lowercase().as_str() {
            "north" | "n" => Some(Heading::North),
            "east" | "e" => Some(Heading::East),
            "south" | "s" => Some(Heading::South),
            "west" | "w" => Some(Heading::West),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Heading::North => "north",
            Heading::East => "east",
            Heading::South => "south",
            Heading::West => "west",
        }
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* ===================== Offset ===================== */

/// Integer world-space offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
    pub dz: i32,
}

impl Offset {
    pub const ZERO: Offset = Offset { dx: 0, dy: 0, dz: 0 };

    pub const fn new(dx: i32, dy: i32, dz: i32) -> Self {
        Self { dx, dy, dz }
    }

    /// Component-wise multiply, saturating at the `i32` bounds
    pub fn scale(self, n: i32) -> Offset {
        Offset::new(
            self.dx.saturating_mul(n),
            self.dy.saturating_mul(n),
            self.dz.saturating_mul(n),
        )
    }

    fn dot_xz(self, other: Offset) -> i32 {
        self.dx
            .saturating_mul(other.dx)
            .saturating_add(self.dz.saturating_mul(other.dz))
    }
}

impl Add for Offset {
    type Output = Offset;

    fn add(self, rhs: Offset) -> Offset {
        Offset::new(
            self.dx.saturating_add(rhs.dx),
            self.dy.saturating_add(rhs.dy),
            self.dz.saturating_add(rhs.dz),
        )
    }
}

impl Neg for Offset {
    type Output = Offset;

    fn neg(self) -> Offset {
        self.scale(-1)
    }
}

/* ===================== Selector ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Forward,
    Back,
    Left,
    Right,
    Up,
    Down,
}

impl Axis {
    pub fn from_letter(letter: char) -> Option<Axis> {
        match letter.to_ascii_uppercase() {
            'F' => Some(Axis::Forward),
            'B' => Some(Axis::Back),
            'L' => Some(Axis::Left),
            'R' => Some(Axis::Right),
            'U' => Some(Axis::Up),
            'D' => Some(Axis::Down),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Axis::Forward => 'F',
            Axis::Back => 'B',
            Axis::Left => 'L',
            Axis::Right => 'R',
            Axis::Up => 'U',
            Axis::Down => 'D',
        }
    }

    fn unit(self, heading: Heading) -> Offset {
        match self {
            Axis::Forward => heading.forward(),
            Axis::Back => -heading.forward(),
            Axis::Right => heading.right(),
            Axis::Left => -heading.right(),
            Axis::Up => Offset::new(0, 1, 0),
            Axis::Down => Offset::new(0, -1, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelTerm {
    pub axis: Axis,
    pub n: i32,
}

impl SelTerm {
    pub fn new(axis: Axis, n: i32) -> Self {
        Self { axis, n }
    }
}

impl fmt::Display for SelTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.axis.letter(), self.n)
    }
}

/// Ordered list of relative terms. Terms combine additively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Selector {
    pub terms: Vec<SelTerm>,
}

impl Selector {
    pub fn new(terms: Vec<SelTerm>) -> Self {
        Self { terms }
    }

    /// Concatenate two selectors
    pub fn join(&self, other: &Selector) -> Selector {
        let mut terms = self.terms.clone();
        terms.extend(other.terms.iter().copied());
        Selector { terms }
    }

    /// Resolve against a heading into a world offset
    pub fn resolve(&self, heading: Heading) -> Offset {
        resolve(self, heading)
    }

    /// Express a world offset as a canonical selector for `heading`.
    ///
    /// Produces at most one forward/back, one right/left and one up/down
    /// term, in that order. The zero offset becomes `F0`.
    pub fn from_offset(offset: Offset, heading: Heading) -> Selector {
        let forward = offset.dot_xz(heading.forward());
        let right = offset.dot_xz(heading.right());

        let mut terms = Vec::with_capacity(3);
        if forward > 0 {
            terms.push(SelTerm::new(Axis::Forward, forward));
        } else if forward < 0 {
            terms.push(SelTerm::new(Axis::Back, forward.saturating_neg()));
        }
        if right > 0 {
            terms.push(SelTerm::new(Axis::Right, right));
        } else if right < 0 {
            terms.push(SelTerm::new(Axis::Left, right.saturating_neg()));
        }
        if offset.dy > 0 {
            terms.push(SelTerm::new(Axis::Up, offset.dy));
        } else if offset.dy < 0 {
            terms.push(SelTerm::new(Axis::Down, offset.dy.saturating_neg()));
        }
        if terms.is_empty() {
            terms.push(SelTerm::new(Axis::Forward, 0));
        }
        Selector { terms }
    }

    /// Parse selector text such as `F1+U2+R-1` or `F^`
    pub fn parse(text: &str) -> Option<Selector> {
        let mut terms = Vec::new();
        for raw in text.split('+') {
            let raw = raw.trim();
            let (body, extra) = if let Some(body) = raw.strip_suffix('^') {
                (body, Some(SelTerm::new(Axis::Up, 1)))
            } else if let Some(body) = raw.strip_suffix('_') {
                (body, Some(SelTerm::new(Axis::Down, 1)))
            } else {
                (raw, None)
            };
            let mut chars = body.chars();
            let axis = Axis::from_letter(chars.next()?)?;
            let rest = chars.as_str();
            let n = if rest.is_empty() { 1 } else { rest.parse().ok()? };
            terms.push(SelTerm::new(axis, n));
            terms.extend(extra);
        }
        Some(Selector { terms })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return f.write_str("F0");
        }
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{}", term)?;
        }
        Ok(())
    }
}

/// Map a selector and heading to an integer offset. Total: an empty
/// selector resolves to the zero vector and huge magnitudes saturate.
pub fn resolve(selector: &Selector, heading: Heading) -> Offset {
    selector
        .terms
        .iter()
        .fold(Offset::ZERO, |acc, term| acc + term.axis.unit(heading).scale(term.n))
}

/// Canonical selector key for an offset, used to label snapshot cells
pub fn offset_key(offset: Offset, heading: Heading) -> String {
    Selector::from_offset(offset, heading).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(text: &str) -> Selector {
        Selector::parse(text).unwrap()
    }

    #[test]
    fn test_resolve_forward_per_heading() {
        assert_eq!(sel("F1").resolve(Heading::North), Offset::new(0, 0, 1));
        assert_eq!(sel("F1").resolve(Heading::East), Offset::new(1, 0, 0));
        assert_eq!(sel("F1").resolve(Heading::South), Offset::new(0, 0, -1));
        assert_eq!(sel("F1").resolve(Heading::West), Offset::new(-1, 0, 0));
    }

    #[test]
    fn test_rotation_maps_right_to_next_forward() {
        for heading in Heading::ALL {
            assert_eq!(
                sel("R1").resolve(heading),
                sel("F1").resolve(heading.turn_right())
            );
            assert_eq!(
                sel("L1").resolve(heading),
                sel("F1").resolve(heading.turn_left())
            );
            assert_eq!(sel("B2").resolve(heading), sel("F-2").resolve(heading));
        }
    }

    #[test]
    fn test_resolve_is_additive() {
        let parts = ["F1", "U2", "R-1", "B3", "L2", "D1"];
        for heading in Heading::ALL {
            for a in parts {
                for b in parts {
                    let joined = sel(a).join(&sel(b));
                    assert_eq!(
                        joined.resolve(heading),
                        sel(a).resolve(heading) + sel(b).resolve(heading)
                    );
                    // order does not matter
                    assert_eq!(joined.resolve(heading), sel(b).join(&sel(a)).resolve(heading));
                }
            }
        }
    }

    #[test]
    fn test_empty_selector_is_zero() {
        assert_eq!(Selector::default().resolve(Heading::West), Offset::ZERO);
    }

    #[test]
    fn test_vertical_terms_ignore_heading() {
        for heading in Heading::ALL {
            assert_eq!(sel("U2+D1").resolve(heading), Offset::new(0, 1, 0));
        }
    }

    #[test]
    fn test_parse_defaults_and_suffixes() {
        assert_eq!(sel("F").terms, vec![SelTerm::new(Axis::Forward, 1)]);
        assert_eq!(
            sel("F2^").terms,
            vec![SelTerm::new(Axis::Forward, 2), SelTerm::new(Axis::Up, 1)]
        );
        assert_eq!(sel("R-1_").resolve(Heading::North), Offset::new(-1, -1, 0));
        assert!(Selector::parse("X1").is_none());
        assert!(Selector::parse("F1+").is_none());
    }

    #[test]
    fn test_from_offset_inverts_resolve() {
        for heading in Heading::ALL {
            for text in ["F1", "F2+R1+U1", "B1+L3+D2", "R4"] {
                let offset = sel(text).resolve(heading);
                let key = Selector::from_offset(offset, heading);
                assert_eq!(key.resolve(heading), offset);
            }
        }
        assert_eq!(offset_key(Offset::ZERO, Heading::North), "F0");
        assert_eq!(offset_key(Offset::new(1, 1, 2), Heading::North), "F2+R1+U1");
    }

    #[test]
    fn test_resolve_saturates_extreme_magnitudes() {
        let max = i32::MAX;
        assert_eq!(
            sel("F2147483647+F1").resolve(Heading::North),
            Offset::new(0, 0, max)
        );
        assert_eq!(
            sel("B2147483647+B2").resolve(Heading::East),
            Offset::new(i32::MIN, 0, 0)
        );
        assert_eq!(sel("U2147483647").resolve(Heading::West), Offset::new(0, max, 0));

        let extreme = Offset::new(i32::MIN, i32::MIN, 0);
        assert_eq!(-extreme, Offset::new(max, max, 0));
        assert_eq!(offset_key(extreme, Heading::North), "L2147483647+D2147483647");
    }

    #[test]
    fn test_yaw_round_trip() {
        for heading in Heading::ALL {
            assert_eq!(Heading::from_yaw(heading.yaw()), heading);
            assert_eq!(Heading::from_yaw(heading.yaw() + 0.3), heading);
            assert_eq!(Heading::from_yaw(heading.yaw() - 0.3 + std::f64::consts::TAU), heading);
        }
    }
}
