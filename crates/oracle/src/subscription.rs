use flight_surety_contracts::{OracleContract, RequestLog};
use flight_surety_storage::{Checkpoint, CheckpointStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::Result;

/// Where the poller starts when no checkpoint applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "StartBlockRepr", into = "StartBlockRepr")]
pub enum StartBlock {
    /// Replay from genesis.
    #[default]
    Earliest,
    /// Start at the current head block.
    Latest,
    Number(u64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StartBlockRepr {
    Number(u64),
    Tag(String),
}

impl TryFrom<StartBlockRepr> for StartBlock {
    type Error = String;

    fn try_from(repr: StartBlockRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            StartBlockRepr::Number(n) => Ok(StartBlock::Number(n)),
            StartBlockRepr::Tag(tag) => tag.parse(),
        }
    }
}

impl From<StartBlock> for StartBlockRepr {
    fn from(start: StartBlock) -> Self {
        match start {
            StartBlock::Number(n) => StartBlockRepr::Number(n),
            other => StartBlockRepr::Tag(other.to_string()),
        }
    }
}

impl FromStr for StartBlock {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "earliest" | "genesis" => Ok(StartBlock::Earliest),
            "latest" => Ok(StartBlock::Latest),
            other => other
                .parse::<u64>()
                .map(StartBlock::Number)
                .map_err(|_| format!("invalid start block '{}'", s)),
        }
    }
}

impl fmt::Display for StartBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartBlock::Earliest => write!(f, "earliest"),
            StartBlock::Latest => write!(f, "latest"),
            StartBlock::Number(n) => write!(f, "{}", n),
        }
    }
}

/// One block range and the requests found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollBatch {
    pub from_block: u64,
    pub to_block: u64,
    pub head: u64,
    pub requests: Vec<RequestLog>,
}

impl PollBatch {
    pub fn caught_up(&self) -> bool {
        self.to_block >= self.head
    }
}

/// Walks the chain in bounded block ranges looking for `OracleRequest`
/// logs.
///
/// The cursor only moves on [`commit`](Self::commit), after the caller
/// has dispatched the batch.
pub struct RequestPoller {
    contract: Arc<dyn OracleContract>,
    store: Arc<dyn CheckpointStore>,
    key: String,
    start: StartBlock,
    resume: bool,
    batch_blocks: u64,
    next_block: Option<u64>,
}

impl RequestPoller {
    pub fn new(
        contract: Arc<dyn OracleContract>,
        store: Arc<dyn CheckpointStore>,
        key: impl Into<String>,
        start: StartBlock,
        batch_blocks: u64,
    ) -> Self {
        Self {
            contract,
            store,
            key: key.into(),
            start,
            resume: true,
            batch_blocks: batch_blocks.max(1),
            next_block: None,
        }
    }

    pub fn resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn next_block(&self) -> Option<u64> {
        self.next_block
    }

    async fn cursor(&mut self) -> Result<u64> {
        if let Some(next) = self.next_block {
            return Ok(next);
        }

        let next = match self.store.load(&self.key)? {
            Some(checkpoint) if self.resume => {
                info!(key = %self.key, next_block = checkpoint.next_block, "Resuming from checkpoint");
                checkpoint.next_block
            }
            _ => match self.start {
                StartBlock::Earliest => 0,
                StartBlock::Latest => self.contract.latest_block().await?,
                StartBlock::Number(n) => n,
            },
        };

        info!(from_block = next, start = %self.start, "Watching for oracle requests");
        self.next_block = Some(next);
        Ok(next)
    }

    /// Fetches the next range, or `None` when the cursor is past the head.
    pub async fn poll(&mut self) -> Result<Option<PollBatch>> {
        let from_block = self.cursor().await?;
        let head = self.contract.latest_block().await?;
        if from_block > head {
            return Ok(None);
        }

        let to_block = head.min(from_block.saturating_add(self.batch_blocks - 1));
        let requests = self.contract.oracle_requests(from_block, to_block).await?;
        debug!(from_block, to_block, head, found = requests.len(), "Polled oracle requests");

        Ok(Some(PollBatch {
            from_block,
            to_block,
            head,
            requests,
        }))
    }

    /// Advances the cursor past `batch` and persists it.
    pub fn commit(&mut self, batch: &PollBatch) -> Result<()> {
        let next = batch.to_block + 1;
        self.next_block = Some(next);
        self.store.save(&self.key, Checkpoint::new(next))?;
        Ok(())
    }
}
