use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Letter grades accepted by letter-graded sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
    P,
    NP,
}

impl LetterGrade {
    const ALL: [(Self, &'static str); 7] = [
        (Self::A, "A"),
        (Self::B, "B"),
        (Self::C, "C"),
        (Self::D, "D"),
        (Self::F, "F"),
        (Self::P, "P"),
        (Self::NP, "NP"),
    ];

    pub const fn points(self) -> GradePoints {
        match self {
            LetterGrade::A => GradePoints(4.0),
            LetterGrade::B => GradePoints(3.0),
            LetterGrade::C | LetterGrade::P => GradePoints(2.0),
            LetterGrade::D => GradePoints(1.0),
            LetterGrade::F | LetterGrade::NP => GradePoints(0.0),
        }
    }

    pub fn label(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(letter, _)| *letter == self)
            .map(|(_, label)| *label)
            .unwrap_or("?")
    }

    fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|(_, label)| raw.eq_ignore_ascii_case(label))
            .map(|(letter, _)| *letter)
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Four-point scale value used as the comparable grade rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradePoints(f32);

impl GradePoints {
    /// Lowest passing value, the "D" / 60 line.
    pub const PASSING: Self = GradePoints(1.0);

    pub const fn value(self) -> f32 {
        self.0
    }
}

impl fmt::Display for GradePoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

/// A recorded grade: a letter or a score in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Grade {
    Letter(LetterGrade),
    Score(f32),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("grade `{0}` is outside the accepted domain")]
pub struct GradeError(pub String);

impl Grade {
    pub fn score(value: f32) -> Result<Self, GradeError> {
        if value.is_finite() && (0.0..=100.0).contains(&value) {
            Ok(Self::Score(value))
        } else {
            Err(GradeError(value.to_string()))
        }
    }

    pub fn points(self) -> GradePoints {
        match self {
            Grade::Letter(letter) => letter.points(),
            Grade::Score(score) => {
                if score >= 90.0 {
                    GradePoints(4.0)
                } else if score >= 80.0 {
                    GradePoints(3.0)
                } else if score >= 70.0 {
                    GradePoints(2.0)
                } else if score >= 60.0 {
                    GradePoints(1.0)
                } else {
                    GradePoints(0.0)
                }
            }
        }
    }

    pub fn is_passing(self) -> bool {
        self.points() >= GradePoints::PASSING
    }

    /// Letter equivalent, used for transcript display of numeric grades.
    pub fn letter(self) -> LetterGrade {
        match self {
            Grade::Letter(letter) => letter,
            Grade::Score(_) => match self.points().value() {
                p if p >= 4.0 => LetterGrade::A,
                p if p >= 3.0 => LetterGrade::B,
                p if p >= 2.0 => LetterGrade::C,
                p if p >= 1.0 => LetterGrade::D,
                _ => LetterGrade::F,
            },
        }
    }
}

/// Comparable rank of a possibly missing grade. Ungraded input has no rank and
/// must never be read as passing.
pub fn rank(grade: Option<&Grade>) -> Option<GradePoints> {
    grade.map(|grade| grade.points())
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::Letter(letter) => write!(f, "{letter}"),
            Grade::Score(score) if score.fract() == 0.0 => write!(f, "{}", *score as i32),
            Grade::Score(score) => write!(f, "{score}"),
        }
    }
}

impl FromStr for Grade {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if let Some(letter) = LetterGrade::parse(raw) {
            return Ok(Self::Letter(letter));
        }

        match raw.parse::<f32>() {
            Ok(value) => Self::score(value).map_err(|_| GradeError(raw.to_string())),
            Err(_) => Err(GradeError(raw.to_string())),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGrade {
    Text(String),
    Number(f64),
}

impl<'de> Deserialize<'de> for Grade {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawGrade::deserialize(deserializer)? {
            RawGrade::Text(text) => text.parse().map_err(serde::de::Error::custom),
            RawGrade::Number(value) => {
                Grade::score(value as f32).map_err(serde::de::Error::custom)
            }
        }
    }
}
