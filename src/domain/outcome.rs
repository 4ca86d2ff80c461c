use serde::{Deserialize, Serialize};

/// Side a user stakes on (contract encoding: 1 = Up, 2 = Down)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Side {
    Up,
    Down,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Up => "UP",
            Side::Down => "DOWN",
        }
    }
}

/// The contract only emits 1 or 2; anything that is not Up is booked as Down.
impl From<u8> for Side {
    fn from(raw: u8) -> Self {
        if raw == 1 {
            Side::Up
        } else {
            Side::Down
        }
    }
}

impl From<Side> for u8 {
    fn from(side: Side) -> Self {
        match side {
            Side::Up => 1,
            Side::Down => 2,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved direction of a round, or the AI's call for it.
///
/// `None` is a push: the price did not move (or the round was voided).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Outcome {
    None,
    Up,
    Down,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::None => "NONE",
            Outcome::Up => "UP",
            Outcome::Down => "DOWN",
        }
    }

    /// The side that collects the pool, if any
    pub fn winning_side(&self) -> Option<Side> {
        match self {
            Outcome::None => None,
            Outcome::Up => Some(Side::Up),
            Outcome::Down => Some(Side::Down),
        }
    }

    pub fn is_push(&self) -> bool {
        matches!(self, Outcome::None)
    }
}

impl From<u8> for Outcome {
    fn from(raw: u8) -> Self {
        match raw {
            1 => Outcome::Up,
            2 => Outcome::Down,
            _ => Outcome::None,
        }
    }
}

impl From<Outcome> for u8 {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::None => 0,
            Outcome::Up => 1,
            Outcome::Down => 2,
        }
    }
}

impl From<Side> for Outcome {
    fn from(side: Side) -> Self {
        match side {
            Side::Up => Outcome::Up,
            Side::Down => Outcome::Down,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
