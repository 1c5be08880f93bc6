//! # Ticket Ranking
//!
//! Orders a user's tickets into four tiers:
//!
//! - **Owner**: assigned to or reported by the user
//! - **Related**: semantically close to one of the user's tickets
//! - **Parent**: referenced as parent by another ticket
//! - **Remainder**: everything else
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        TicketRanker                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  owner matching ──► BatchFetcher ──► similarity ──► tiers       │
//! │                          │                                      │
//! │                          ▼                                      │
//! │                 TieredEmbeddingStore ◄── ContentChangeDetector  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use triage_ranking::{RankingConfig, TicketRanker};
//!
//! let ranker = TicketRanker::new(RankingConfig::new().with_durable_path("embeddings.json")).await?;
//!
//! ranker.sync_tickets(&mut tickets).await;
//! let ordered = ranker.rank(tickets, Some("ada@example.com"), true).await;
//! ```

pub mod change;
pub mod config;
pub mod engine;
pub mod error;
pub mod owner;
pub mod ranking;
pub mod ticket;

pub use change::ContentChangeDetector;
pub use config::{RankingConfig, SimilarityConfig};
pub use engine::{TicketRanker, TicketRankerBuilder};
pub use error::{RankingError, Result};
pub use owner::{OwnerMatch, match_owner, person_matches};
pub use ranking::{RankTier, RankedTicket, count_owner_tickets, rank_tickets, related_tier_allowed};
pub use ticket::{Person, Ticket};

// Re-export from dependencies for convenience
pub use triage_embeddings::{CacheStats, Embedding, ProbeReason, ProbeResult};
