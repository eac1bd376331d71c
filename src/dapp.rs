use anyhow::{Context, Result};
use flight_surety_contracts::DappClient;
use flight_surety_types::Flight;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

/// Flights registered by the demo session.
pub const DEMO_FLIGHTS: [&str; 4] = ["F1", "F2", "F3", "F4"];

/// One labelled result line. A failed call shows its error in place of
/// the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub label: String,
    pub value: Result<String, String>,
}

impl Row {
    pub fn new<T: fmt::Display, E: fmt::Display>(label: impl Into<String>, result: Result<T, E>) -> Self {
        Self {
            label: label.into(),
            value: result.map(|v| v.to_string()).map_err(|e| e.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.value.is_err()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Ok(value) => write!(f, "{:<24} {}", self.label, value),
            Err(error) => write!(f, "{:<24} error: {}", self.label, error),
        }
    }
}

/// A titled group of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub rows: Vec<Row>,
}

impl Section {
    pub fn new(title: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            title: title.into(),
            rows,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.title)?;
        for row in &self.rows {
            writeln!(f, "{}", row)?;
        }
        Ok(())
    }
}

/// Flights registered from this machine, kept between invocations.
pub struct FlightBook {
    path: PathBuf,
}

impl FlightBook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A missing file is an empty book.
    pub fn load(&self) -> Result<Vec<Flight>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Invalid flight list {}", self.path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.path.display())),
        }
    }

    pub fn save(&self, flights: &[Flight]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(flights)?)?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        debug!(path = %self.path.display(), flights = flights.len(), "Flight list written");
        Ok(())
    }
}

/// Name and time of every flight, then the registrations that failed.
pub fn flight_rows(flights: &[Flight], failures: Vec<Row>) -> Vec<Row> {
    let mut rows = Vec::with_capacity(flights.len() * 2 + failures.len());
    for flight in flights {
        rows.push(Row::new::<_, String>("Flight", Ok(&flight.name)));
        rows.push(Row::new::<_, String>("Time", Ok(flight.timestamp)));
    }
    rows.extend(failures);
    rows
}

/// Operational status followed by registration of [`DEMO_FLIGHTS`].
pub async fn demo(client: &DappClient) -> Vec<Section> {
    let mut sections = vec![Section::new(
        "Operational Status",
        vec![
            Row::new("App operational", client.is_operational().await),
            Row::new("Data operational", client.data_operational().await),
        ],
    )];

    let mut failures = Vec::new();
    for name in DEMO_FLIGHTS {
        if let Err(e) = client.register_flight(name).await {
            failures.push(Row::new::<String, _>(format!("Flight {}", name), Err(e)));
        }
    }
    sections.push(Section::new(
        "Available flights",
        flight_rows(&client.flights(), failures),
    ));

    sections
}
