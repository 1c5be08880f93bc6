//! The ranking algorithm.
//!
//! Tickets are split into four disjoint tiers and concatenated:
//!
//! 1. **Owner**: assigned to or reported by the viewing user, newest update first
//! 2. **Related**: semantically close to an owner ticket, newest update first
//! 3. **Parent**: referenced as parent by another ticket, newest creation first
//! 4. **Remainder**: everything else, newest creation first
//!
//! Ties inside a tier keep input order.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use triage_embeddings::{Embedding, similar_at_least};

use crate::config::SimilarityConfig;
use crate::owner::{OwnerMatch, match_owner};
use crate::ticket::Ticket;

/// Which tier a ticket landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankTier {
    Owner,
    Related,
    Parent,
    Remainder,
}

/// A ticket together with why it was placed where it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedTicket {
    pub ticket: Ticket,
    pub tier: RankTier,

    /// Set for owner tickets.
    pub owner_match: Option<OwnerMatch>,

    /// Set for related tickets: the score that earned membership.
    pub similarity: Option<f32>,
}

/// Number of tickets matching `owner`.
pub fn count_owner_tickets(tickets: &[Ticket], owner: Option<&str>) -> usize {
    match owner {
        Some(owner) => tickets
            .iter()
            .filter(|t| match_owner(t, owner).is_some())
            .count(),
        None => 0,
    }
}

/// Whether related tickets should be computed for this many owner tickets.
pub fn related_tier_allowed(owner_count: usize, config: &SimilarityConfig) -> bool {
    config.enabled && owner_count > 0 && owner_count <= config.max_owner_tickets
}

/// Rank `tickets` for the user identified by `owner`.
///
/// `embeddings` maps ticket id to vector; tickets missing from it are never
/// compared. Passing `None` skips the related tier entirely.
pub fn rank_tickets(
    tickets: Vec<Ticket>,
    owner: Option<&str>,
    embeddings: Option<&HashMap<String, Embedding>>,
    config: &SimilarityConfig,
) -> Vec<RankedTicket> {
    let total = tickets.len();
    let mut tiers: Vec<Option<RankTier>> = vec![None; total];
    let mut owner_matches: Vec<Option<OwnerMatch>> = vec![None; total];
    let mut scores: Vec<Option<f32>> = vec![None; total];

    // Tier 1
    let mut owners = Vec::new();
    if let Some(owner) = owner {
        for (i, ticket) in tickets.iter().enumerate() {
            if let Some(matched) = match_owner(ticket, owner) {
                tiers[i] = Some(RankTier::Owner);
                owner_matches[i] = Some(matched);
                owners.push(i);
            }
        }
    }
    owners.sort_by_key(|&i| Reverse(tickets[i].updated));

    // Tier 2
    let mut related = Vec::new();
    match embeddings {
        Some(embeddings) if related_tier_allowed(owners.len(), config) => {
            for &owner_index in &owners {
                let Some(query) = embeddings.get(&tickets[owner_index].id) else {
                    debug!(ticket_id = %tickets[owner_index].id, "Owner ticket has no embedding");
                    continue;
                };

                // Input order, first occurrence of an id only.
                let mut unplaced: HashMap<&str, usize> = HashMap::new();
                let mut candidates: Vec<(&str, &[f32])> = Vec::new();
                for (i, ticket) in tickets.iter().enumerate() {
                    if tiers[i].is_some() || unplaced.contains_key(ticket.id.as_str()) {
                        continue;
                    }
                    if let Some(embedding) = embeddings.get(&ticket.id) {
                        unplaced.insert(ticket.id.as_str(), i);
                        candidates.push((ticket.id.as_str(), embedding.as_slice()));
                    }
                }

                for hit in similar_at_least(query, candidates, config.threshold) {
                    let Some(&i) = unplaced.get(hit.id.as_str()) else {
                        continue;
                    };
                    if tiers[i].is_none() {
                        tiers[i] = Some(RankTier::Related);
                        scores[i] = Some(hit.score);
                        related.push(i);
                    }
                }
            }
        }
        Some(_) => debug!(
            owner_tickets = owners.len(),
            max = config.max_owner_tickets,
            "Skipping related tickets"
        ),
        None => {}
    }
    related.sort_by_key(|&i| (Reverse(tickets[i].updated), i));

    // Tier 3
    let referenced: HashSet<&str> = tickets
        .iter()
        .filter_map(|t| t.parent_id.as_deref().filter(|parent| *parent != t.id))
        .collect();
    let mut parents = Vec::new();
    for (i, ticket) in tickets.iter().enumerate() {
        if tiers[i].is_none() && referenced.contains(ticket.id.as_str()) {
            tiers[i] = Some(RankTier::Parent);
            parents.push(i);
        }
    }
    parents.sort_by_key(|&i| Reverse(tickets[i].created));

    // Tier 4
    let mut remainder: Vec<usize> = (0..total).filter(|&i| tiers[i].is_none()).collect();
    for &i in &remainder {
        tiers[i] = Some(RankTier::Remainder);
    }
    remainder.sort_by_key(|&i| Reverse(tickets[i].created));

    info!(
        owner = owners.len(),
        related = related.len(),
        parents = parents.len(),
        remainder = remainder.len(),
        "Ranked tickets"
    );

    let mut slots: Vec<Option<Ticket>> = tickets.into_iter().map(Some).collect();
    owners
        .into_iter()
        .chain(related)
        .chain(parents)
        .chain(remainder)
        .filter_map(|i| {
            let ticket = slots[i].take()?;
            Some(RankedTicket {
                ticket,
                tier: tiers[i].unwrap_or(RankTier::Remainder),
                owner_match: owner_matches[i],
                similarity: scores[i],
            })
        })
        .collect()
}
