use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Circle,
    Triangle,
    Cross,
    Square,
    Star,
    Whot,
}

impl Shape {
    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Circle => "circle",
            Shape::Triangle => "triangle",
            Shape::Cross => "cross",
            Shape::Square => "square",
            Shape::Star => "star",
            Shape::Whot => "whot",
        }
    }
}

impl FromStr for Shape {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "circle" => Ok(Shape::Circle),
            "triangle" => Ok(Shape::Triangle),
            "cross" => Ok(Shape::Cross),
            "square" => Ok(Shape::Square),
            "star" => Ok(Shape::Star),
            "whot" => Ok(Shape::Whot),
            other => Err(CoreError::UnknownSymbol(other.to_string())),
        }
    }
}

/// A Whot card face. Identifiers render as `<shape>_<rank>.png`, the same
/// names the card images carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    shape: Shape,
    rank: u8,
}

impl Symbol {
    const fn card(shape: Shape, rank: u8) -> Self {
        Self { shape, rank }
    }

    pub fn shape(self) -> Shape {
        self.shape
    }

    pub fn rank(self) -> u8 {
        self.rank
    }

    pub fn is_wildcard(self) -> bool {
        self == WILDCARD
    }

    pub fn from_index(i: usize) -> Option<Self> {
        CATALOG.get(i).copied()
    }

    pub fn to_index(self) -> usize {
        CATALOG
            .iter()
            .position(|s| *s == self)
            .unwrap_or_else(|| unreachable!("symbols only exist through the catalog"))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}.png", self.shape.as_str(), self.rank)
    }
}

impl FromStr for Symbol {
    type Err = CoreError;

    /// Accepts `circle_3.png` or the bare `circle_3`. Only catalog cards parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || CoreError::UnknownSymbol(s.to_string());
        let stem = s.strip_suffix(".png").unwrap_or(s);
        let (shape, rank) = stem.split_once('_').ok_or_else(unknown)?;
        let shape: Shape = shape.parse().map_err(|_| unknown())?;
        let rank: u8 = rank.parse().map_err(|_| unknown())?;
        let symbol = Symbol::card(shape, rank);
        if CATALOG.contains(&symbol) {
            Ok(symbol)
        } else {
            Err(unknown())
        }
    }
}

impl TryFrom<String> for Symbol {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.to_string()
    }
}

/// The jackpot card. Its rank (20) is shared with no other shape.
pub const WILDCARD: Symbol = Symbol::card(Shape::Whot, 20);

use Shape::{Circle, Cross, Square, Star, Triangle};

pub const CATALOG: [Symbol; 50] = [
    Symbol::card(Circle, 1),
    Symbol::card(Circle, 2),
    Symbol::card(Circle, 3),
    Symbol::card(Circle, 4),
    Symbol::card(Circle, 5),
    Symbol::card(Circle, 7),
    Symbol::card(Circle, 8),
    Symbol::card(Circle, 10),
    Symbol::card(Circle, 11),
    Symbol::card(Circle, 12),
    Symbol::card(Circle, 13),
    Symbol::card(Circle, 14),
    Symbol::card(Triangle, 1),
    Symbol::card(Triangle, 2),
    Symbol::card(Triangle, 3),
    Symbol::card(Triangle, 4),
    Symbol::card(Triangle, 5),
    Symbol::card(Triangle, 7),
    Symbol::card(Triangle, 8),
    Symbol::card(Triangle, 10),
    Symbol::card(Triangle, 11),
    Symbol::card(Triangle, 12),
    Symbol::card(Triangle, 13),
    Symbol::card(Triangle, 14),
    Symbol::card(Cross, 1),
    Symbol::card(Cross, 2),
    Symbol::card(Cross, 3),
    Symbol::card(Cross, 5),
    Symbol::card(Cross, 7),
    Symbol::card(Cross, 10),
    Symbol::card(Cross, 11),
    Symbol::card(Cross, 13),
    Symbol::card(Cross, 14),
    Symbol::card(Square, 1),
    Symbol::card(Square, 2),
    Symbol::card(Square, 3),
    Symbol::card(Square, 5),
    Symbol::card(Square, 7),
    Symbol::card(Square, 10),
    Symbol::card(Square, 11),
    Symbol::card(Square, 13),
    Symbol::card(Square, 14),
    Symbol::card(Star, 1),
    Symbol::card(Star, 2),
    Symbol::card(Star, 3),
    Symbol::card(Star, 4),
    Symbol::card(Star, 5),
    Symbol::card(Star, 7),
    Symbol::card(Star, 8),
    WILDCARD,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_is_unique_and_indexed() {
        let unique: HashSet<_> = CATALOG.iter().collect();
        assert_eq!(unique.len(), CATALOG.len());
        for (i, s) in CATALOG.iter().enumerate() {
            assert_eq!(s.to_index(), i);
            assert_eq!(Symbol::from_index(i), Some(*s));
        }
    }

    #[test]
    fn wildcard_rank_is_unshared() {
        let sharing = CATALOG
            .iter()
            .filter(|s| s.rank() == WILDCARD.rank())
            .count();
        assert_eq!(sharing, 1);
    }

    #[test]
    fn parse_and_render() {
        let s: Symbol = "circle_3.png".parse().unwrap();
        assert_eq!(s.shape(), Shape::Circle);
        assert_eq!(s.rank(), 3);
        assert_eq!(s.to_string(), "circle_3.png");
        assert_eq!("whot_20".parse::<Symbol>().unwrap(), WILDCARD);
    }

    #[test]
    fn rejects_cards_outside_catalog() {
        assert!("circle_6.png".parse::<Symbol>().is_err());
        assert!("hexagon_1.png".parse::<Symbol>().is_err());
        assert!("circle.png".parse::<Symbol>().is_err());
        assert!("whot_1.png".parse::<Symbol>().is_err());
    }

    #[test]
    fn serde_uses_identifier() {
        let json = serde_json::to_string(&WILDCARD).unwrap();
        assert_eq!(json, "\"whot_20.png\"");
        let back: Symbol = serde_json::from_str("\"star_8.png\"").unwrap();
        assert_eq!(back.shape(), Shape::Star);
        assert!(serde_json::from_str::<Symbol>("\"star_9.png\"").is_err());
    }
}
