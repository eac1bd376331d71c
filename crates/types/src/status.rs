use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Result, TypesError};

/// Flight status codes understood by the App contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Unknown,
    OnTime,
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl StatusCode {
    pub const ALL: [StatusCode; 6] = [
        StatusCode::Unknown,
        StatusCode::OnTime,
        StatusCode::LateAirline,
        StatusCode::LateWeather,
        StatusCode::LateTechnical,
        StatusCode::LateOther,
    ];

    /// On-chain `uint8` value.
    pub fn code(self) -> u8 {
        match self {
            StatusCode::Unknown => 0,
            StatusCode::OnTime => 10,
            StatusCode::LateAirline => 20,
            StatusCode::LateWeather => 30,
            StatusCode::LateTechnical => 40,
            StatusCode::LateOther => 50,
        }
    }

    pub fn from_code(code: u64) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| u64::from(status.code()) == code)
            .ok_or(TypesError::UnknownStatusCode(code))
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusCode::Unknown => "STATUS_CODE_UNKNOWN",
            StatusCode::OnTime => "STATUS_CODE_ON_TIME",
            StatusCode::LateAirline => "STATUS_CODE_LATE_AIRLINE",
            StatusCode::LateWeather => "STATUS_CODE_LATE_WEATHER",
            StatusCode::LateTechnical => "STATUS_CODE_LATE_TECHNICAL",
            StatusCode::LateOther => "STATUS_CODE_LATE_OTHER",
        }
    }

    /// Uniform draw over the six codes.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        *Self::ALL
            .choose(rng)
            .unwrap_or(&StatusCode::Unknown)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}
