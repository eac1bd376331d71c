use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Address, U256};

/// A flight as keyed by the App contract: airline, name and departure time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flight {
    pub airline: Address,
    pub name: String,
    pub timestamp: U256,
}

impl Flight {
    pub fn new(airline: Address, name: impl Into<String>, timestamp: U256) -> Self {
        Self {
            airline,
            name: name.into(),
            timestamp,
        }
    }
}

impl fmt::Display for Flight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} ({})", self.name, self.timestamp, self.airline)
    }
}
