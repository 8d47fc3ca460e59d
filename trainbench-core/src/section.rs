//! Direction and section-overlap checks over station positions.
use crate::{topology, CoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards increasing positions (Tokyo to Osaka).
    Down,
    Up,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Down => write!(f, "downbound"),
            Direction::Up => write!(f, "upbound"),
        }
    }
}

pub fn is_downbound(origin: &str, destination: &str) -> Result<bool, CoreError> {
    Ok(topology::position(destination)? > topology::position(origin)?)
}

pub fn direction(origin: &str, destination: &str) -> Result<Direction, CoreError> {
    if is_downbound(origin, destination)? {
        Ok(Direction::Down)
    } else {
        Ok(Direction::Up)
    }
}

/// Checks whether section `b` intersects section `a`.
///
/// Both sections must already be downbound-normalized. `b` is disjoint from `a` only if it
/// lies wholly before `a`'s departure or starts at or after `a`'s arrival, so two sections
/// sharing just a boundary station do not overlap.
pub fn sections_overlap(
    a_origin: &str,
    a_destination: &str,
    b_origin: &str,
    b_destination: &str,
) -> Result<bool, CoreError> {
    let a_dep = topology::position(a_origin)?;
    let a_arr = topology::position(a_destination)?;
    let b_dep = topology::position(b_origin)?;
    let b_arr = topology::position(b_destination)?;

    if b_dep < a_dep && b_arr <= a_dep {
        return Ok(false);
    }
    if b_dep >= a_arr && b_arr > a_arr {
        return Ok(false);
    }

    Ok(true)
}

/// A travelled `(origin, destination)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section<'a> {
    pub origin: &'a str,
    pub destination: &'a str,
}

impl<'a> Section<'a> {
    pub fn new(origin: &'a str, destination: &'a str) -> Self {
        Self {
            origin,
            destination,
        }
    }

    pub fn direction(&self) -> Result<Direction, CoreError> {
        direction(self.origin, self.destination)
    }

    /// Returns the section with endpoints ordered by increasing position.
    pub fn downbound(&self) -> Result<Self, CoreError> {
        match self.direction()? {
            Direction::Down => Ok(*self),
            Direction::Up => Ok(Self::new(self.destination, self.origin)),
        }
    }

    /// True if both sections run in the same direction and their travelled spans intersect.
    pub fn conflicts_with(&self, other: &Section<'_>) -> Result<bool, CoreError> {
        if self.direction()? != other.direction()? {
            return Ok(false);
        }

        let a = self.downbound()?;
        let b = other.downbound()?;
        sections_overlap(a.origin, a.destination, b.origin, b.destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downbound() {
        assert!(is_downbound("Tokyo", "Osaka").unwrap());
        assert!(!is_downbound("Osaka", "Tokyo").unwrap());
        assert_eq!(direction("Kyoto", "Nagoya").unwrap(), Direction::Up);
        assert_eq!(
            is_downbound("Tokyo", "Nowhere"),
            Err(CoreError::UnknownStation("Nowhere".to_string()))
        );
    }

    #[test]
    fn overlap_cases() {
        let cases = [
            (("Furuoka", "Arakawa"), ("Arakawa", "Naruto"), false),
            (("Furuoka", "Arakawa"), ("Furuoka", "Arakawa"), true),
            (("Tokyo", "Osaka"), ("SakuraUchi", "FunaDa"), true),
            (("Tokyo", "Yugo"), ("Hatsuno", "Yamada"), false),
            (("Arakawa", "Naruto"), ("Furuoka", "Arakawa"), false),
            (("Arakawa", "Naruto"), ("Furuoka", "Isogawa"), true),
            (("SakuraUchi", "FunaDa"), ("Tokyo", "Osaka"), true),
        ];

        for ((a_o, a_d), (b_o, b_d), want) in cases {
            assert_eq!(
                sections_overlap(a_o, a_d, b_o, b_d).unwrap(),
                want,
                "{a_o}->{a_d} vs {b_o}->{b_d}"
            );
        }
    }

    #[test]
    fn overlap_unknown_station_is_an_error() {
        assert!(sections_overlap("Tokyo", "Osaka", "Tokyo", "Nowhere").is_err());
    }

    #[test]
    fn section_conflicts() {
        let down = Section::new("Tokyo", "Nagoya");
        let up = Section::new("Nagoya", "Tokyo");
        assert!(!down.conflicts_with(&up).unwrap());

        let up_inner = Section::new("Arakawa", "Yugo");
        let up_touching = Section::new("Osaka", "Nagoya");
        assert!(up.conflicts_with(&up_inner).unwrap());
        assert!(!up.conflicts_with(&up_touching).unwrap());
        assert_eq!(
            up.downbound().unwrap(),
            Section::new("Tokyo", "Nagoya")
        );
    }
}
