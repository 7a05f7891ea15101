//! # Consensus Engine
//!
//! The delegated-BFT core: round scheduling, block lifecycle tracking, vote
//! aggregation, and the driver that ties them together with the external
//! collaborator traits (persistence, peer client, validator oracle, block
//! builder).

pub mod block_manager;
pub mod driver;
pub mod peer;
pub mod proposer_loop;
pub mod sync_loop;
pub mod traits;
pub mod vote;
pub mod vote_aggregator;

pub use block_manager::{BlockManager, BlockManagerError, Status};
pub use driver::{ConsensusDriver, DriverError};
pub use peer::{Peer, Round};
pub use traits::{BlockBuilder, BuildError, OracleError, PeerClient, PeerClientError, ValidatorOracle};
pub use vote::{Certificate, Vote, VoteSet};
pub use vote_aggregator::VoteAggregator;
