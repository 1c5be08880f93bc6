//! Matching a viewing user against a ticket's people.

use serde::{Deserialize, Serialize};

use crate::ticket::{Person, Ticket};

/// How a ticket matched the owner identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerMatch {
    Assignee,
    Reporter,
}

/// Whether `identifier` refers to `person`.
///
/// Exact email match, or a display-name match where either string contains
/// the other. Name comparison ignores case; blank strings never match.
pub fn person_matches(person: &Person, identifier: &str) -> bool {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return false;
    }

    if person
        .email
        .as_deref()
        .is_some_and(|email| email.trim() == identifier)
    {
        return true;
    }

    let name = person.display_name.trim().to_lowercase();
    if name.is_empty() {
        return false;
    }
    let identifier = identifier.to_lowercase();
    name == identifier || name.contains(&identifier) || identifier.contains(&name)
}

/// Match a ticket against the owner identifier. The assignee is checked
/// first; the reporter only when the assignee does not match.
pub fn match_owner(ticket: &Ticket, identifier: &str) -> Option<OwnerMatch> {
    if ticket
        .assignee
        .as_ref()
        .is_some_and(|p| person_matches(p, identifier))
    {
        return Some(OwnerMatch::Assignee);
    }
    if ticket
        .reporter
        .as_ref()
        .is_some_and(|p| person_matches(p, identifier))
    {
        return Some(OwnerMatch::Reporter);
    }
    None
}
