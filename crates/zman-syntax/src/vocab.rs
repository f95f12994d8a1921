//! Fixed vocabularies of the formula language.
//!
//! These tables are immutable and shared by the lexer (word classification),
//! the parser (node construction) and the validator (suggestions).

use std::fmt;

use crate::token::TokenKind;

/// Named astronomical instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Sunrise,
    Sunset,
    SolarNoon,
    SolarMidnight,
    VisibleSunrise,
    VisibleSunset,
    CivilDawn,
    CivilDusk,
    NauticalDawn,
    NauticalDusk,
    AstronomicalDawn,
    AstronomicalDusk,
}

impl Primitive {
    pub const ALL: [Primitive; 12] = [
        Primitive::Sunrise,
        Primitive::Sunset,
        Primitive::SolarNoon,
        Primitive::SolarMidnight,
        Primitive::VisibleSunrise,
        Primitive::VisibleSunset,
        Primitive::CivilDawn,
        Primitive::CivilDusk,
        Primitive::NauticalDawn,
        Primitive::NauticalDusk,
        Primitive::AstronomicalDawn,
        Primitive::AstronomicalDusk,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Sunrise => "sunrise",
            Primitive::Sunset => "sunset",
            Primitive::SolarNoon => "solar_noon",
            Primitive::SolarMidnight => "solar_midnight",
            Primitive::VisibleSunrise => "visible_sunrise",
            Primitive::VisibleSunset => "visible_sunset",
            Primitive::CivilDawn => "civil_dawn",
            Primitive::CivilDusk => "civil_dusk",
            Primitive::NauticalDawn => "nautical_dawn",
            Primitive::NauticalDusk => "nautical_dusk",
            Primitive::AstronomicalDawn => "astronomical_dawn",
            Primitive::AstronomicalDusk => "astronomical_dusk",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Depression angle below the horizon for twilight primitives, and
    /// whether the time is on the rising (morning) side.
    pub fn twilight(self) -> Option<(f64, bool)> {
        match self {
            Primitive::CivilDawn => Some((6.0, true)),
            Primitive::CivilDusk => Some((6.0, false)),
            Primitive::NauticalDawn => Some((12.0, true)),
            Primitive::NauticalDusk => Some((12.0, false)),
            Primitive::AstronomicalDawn => Some((18.0, true)),
            Primitive::AstronomicalDusk => Some((18.0, false)),
            _ => None,
        }
    }
}

/// Built-in functions. `shaos` parses to [`FunctionName::ProportionalHours`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionName {
    Solar,
    ProportionalHours,
    Midpoint,
}

impl FunctionName {
    pub fn name(self) -> &'static str {
        match self {
            FunctionName::Solar => "solar",
            FunctionName::ProportionalHours => "proportional_hours",
            FunctionName::Midpoint => "midpoint",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "solar" => Some(FunctionName::Solar),
            "proportional_hours" | "shaos" => Some(FunctionName::ProportionalHours),
            "midpoint" => Some(FunctionName::Midpoint),
            _ => None,
        }
    }

    /// Usage line shown in arity diagnostics.
    pub fn signature(self) -> &'static str {
        match self {
            FunctionName::Solar => "solar(degrees, direction)",
            FunctionName::ProportionalHours => "proportional_hours(hours, base)",
            FunctionName::Midpoint => "midpoint(time, time)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    BeforeSunrise,
    AfterSunset,
    BeforeNoon,
    AfterNoon,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::BeforeSunrise,
        Direction::AfterSunset,
        Direction::BeforeNoon,
        Direction::AfterNoon,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Direction::BeforeSunrise => "before_sunrise",
            Direction::AfterSunset => "after_sunset",
            Direction::BeforeNoon => "before_noon",
            Direction::AfterNoon => "after_noon",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }

    /// True for directions resolved on the morning (ascending sun) side.
    pub fn is_morning(self) -> bool {
        matches!(self, Direction::BeforeSunrise | Direction::BeforeNoon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionVar {
    Latitude,
    Longitude,
    Elevation,
    DayLength,
    Month,
    Season,
}

impl ConditionVar {
    pub const ALL: [ConditionVar; 6] = [
        ConditionVar::Latitude,
        ConditionVar::Longitude,
        ConditionVar::Elevation,
        ConditionVar::DayLength,
        ConditionVar::Month,
        ConditionVar::Season,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConditionVar::Latitude => "latitude",
            ConditionVar::Longitude => "longitude",
            ConditionVar::Elevation => "elevation",
            ConditionVar::DayLength => "day_length",
            ConditionVar::Month => "month",
            ConditionVar::Season => "season",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }
}

macro_rules! impl_display_by_name {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        })*
    };
}

impl_display_by_name!(Primitive, FunctionName, Direction, ConditionVar);

pub const FUNCTIONS: &[&str] = &["solar", "proportional_hours", "shaos", "midpoint"];

/// Day-span names accepted as the `base` argument of `proportional_hours`.
pub const BASES: &[&str] = &["gra", "mga", "mga_90", "mga_120", "custom"];

pub const KEYWORDS: &[&str] = &["if", "else"];

/// Classifies a scanned word. Unknown words become [`TokenKind::Ident`].
pub fn classify(word: &str) -> TokenKind {
    match word {
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        w if Primitive::from_name(w).is_some() => TokenKind::Primitive,
        w if FUNCTIONS.contains(&w) => TokenKind::Function,
        w if Direction::from_name(w).is_some() => TokenKind::Direction,
        w if BASES.contains(&w) => TokenKind::Base,
        w if ConditionVar::from_name(w).is_some() => TokenKind::ConditionVar,
        _ => TokenKind::Ident,
    }
}

/// Every word the language knows, in table order.
pub fn all_words() -> impl Iterator<Item = &'static str> {
    Primitive::ALL
        .into_iter()
        .map(Primitive::name)
        .chain(FUNCTIONS.iter().copied())
        .chain(Direction::ALL.into_iter().map(Direction::name))
        .chain(BASES.iter().copied())
        .chain(ConditionVar::ALL.into_iter().map(ConditionVar::name))
        .chain(KEYWORDS.iter().copied())
}

/// Closest vocabulary word within a small edit distance, for "did you mean" hints.
pub fn closest_match(word: &str) -> Option<&'static str> {
    let word = word.to_ascii_lowercase();
    let limit = (word.len() / 3).clamp(1, 3);
    all_words()
        .map(|w| (edit_distance(&word, w), w))
        .filter(|(d, _)| *d <= limit)
        .min_by_key(|(d, _)| *d)
        .map(|(_, w)| w)
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut cur = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        prev = cur;
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_every_table() {
        assert_eq!(classify("sunrise"), TokenKind::Primitive);
        assert_eq!(classify("astronomical_dusk"), TokenKind::Primitive);
        assert_eq!(classify("shaos"), TokenKind::Function);
        assert_eq!(classify("after_noon"), TokenKind::Direction);
        assert_eq!(classify("mga_120"), TokenKind::Base);
        assert_eq!(classify("custom"), TokenKind::Base);
        assert_eq!(classify("day_length"), TokenKind::ConditionVar);
        assert_eq!(classify("elevation"), TokenKind::ConditionVar);
        assert_eq!(classify("else"), TokenKind::Else);
        assert_eq!(classify("sunrize_time"), TokenKind::Ident);
    }

    #[test]
    fn shaos_is_an_alias() {
        assert_eq!(FunctionName::from_name("shaos"), Some(FunctionName::ProportionalHours));
        assert_eq!(FunctionName::ProportionalHours.name(), "proportional_hours");
    }

    #[test]
    fn suggests_near_misses() {
        assert_eq!(closest_match("sunrize"), Some("sunrise"));
        assert_eq!(closest_match("midpont"), Some("midpoint"));
        assert_eq!(closest_match("xyz"), None);
    }
}
