//! Like/dislike/reload transitions on a cached summary.

use chrono::{DateTime, Utc};

use insights_core::types::{Reaction, ReactionPatch, Requester, SummaryCacheEntry};

/// One side of the reaction bookkeeping (likes or dislikes).
struct Side<'a> {
    members: &'a mut Vec<String>,
    total: &'a mut u64,
    last: &'a mut String,
}

fn join(side: &mut Side<'_>, id: &str, name: &str) {
    if !side.members.iter().any(|m| m == id) {
        side.members.push(id.to_string());
        *side.total += 1;
    }
    *side.last = name.to_string();
}

fn leave(side: &mut Side<'_>, id: &str, name: &str) {
    let Some(pos) = side.members.iter().position(|m| m == id) else {
        return;
    };
    side.members.remove(pos);
    *side.total = side.total.saturating_sub(1);
    // A recomputed pointer holds the member id, so match on either form.
    let last = side.last.trim();
    let points_at_leaver = last.eq_ignore_ascii_case(name.trim()) || last.eq_ignore_ascii_case(id.trim());
    if side.members.is_empty() || points_at_leaver {
        *side.last = side.members.last().cloned().unwrap_or_default();
    }
}

/// Apply `reaction` by `reactor` to `entry` and stamp the audit fields.
///
/// Joining one side is idempotent and always leaves the other side.
pub fn apply(entry: &mut SummaryCacheEntry, reaction: Reaction, reactor: &Requester, now: DateTime<Utc>) {
    let likes = Side { members: &mut entry.liked_by, total: &mut entry.total_likes, last: &mut entry.last_liked_by };
    let dislikes = Side {
        members: &mut entry.disliked_by,
        total: &mut entry.total_dislikes,
        last: &mut entry.last_disliked_by,
    };
    match reaction {
        Reaction::Like => {
            let (mut toward, mut away) = (likes, dislikes);
            join(&mut toward, &reactor.id, &reactor.name);
            leave(&mut away, &reactor.id, &reactor.name);
        }
        Reaction::Dislike => {
            let (mut toward, mut away) = (dislikes, likes);
            join(&mut toward, &reactor.id, &reactor.name);
            leave(&mut away, &reactor.id, &reactor.name);
        }
        Reaction::Reload => {
            entry.total_likes = 0;
            entry.total_dislikes = 0;
            entry.liked_by.clear();
            entry.disliked_by.clear();
            entry.last_liked_by.clear();
            entry.last_disliked_by.clear();
        }
    }
    entry.updated_by = reactor.id.clone();
    entry.updated_at = now;
}

/// Partial document carrying everything a reaction may have touched.
pub fn patch_of(entry: &SummaryCacheEntry, with_summary: bool) -> ReactionPatch {
    ReactionPatch {
        summary: with_summary.then(|| entry.summary.clone()),
        total_likes: entry.total_likes,
        total_dislikes: entry.total_dislikes,
        liked_by: entry.liked_by.clone(),
        disliked_by: entry.disliked_by.clone(),
        last_liked_by: entry.last_liked_by.clone(),
        last_disliked_by: entry.last_disliked_by.clone(),
        updated_by: entry.updated_by.clone(),
        updated_at: entry.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry() -> SummaryCacheEntry {
        SummaryCacheEntry {
            key: 1,
            topic: "brake wear".into(),
            user_query: "why do brakes wear".into(),
            summary: "Brake wear is...".into(),
            regions: vec![],
            total_likes: 0,
            total_dislikes: 0,
            liked_by: vec![],
            disliked_by: vec![],
            last_liked_by: String::new(),
            last_disliked_by: String::new(),
            updated_by: "SEED1".into(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("date"),
            topic_vector: None,
        }
    }

    fn user(id: &str, name: &str) -> Requester {
        Requester { id: id.into(), name: name.into() }
    }

    #[test]
    fn like_is_idempotent() {
        let mut e = entry();
        let ann = user("ANN1", "Ann");
        apply(&mut e, Reaction::Like, &ann, Utc::now());
        apply(&mut e, Reaction::Like, &ann, Utc::now());
        assert_eq!(e.total_likes, 1);
        assert_eq!(e.total_dislikes, 0);
        assert_eq!(e.liked_by, vec!["ANN1".to_string()]);
        assert_eq!(e.last_liked_by, "Ann");
        assert_eq!(e.updated_by, "ANN1");
    }

    #[test]
    fn switching_sides_moves_the_reactor() {
        let mut e = entry();
        let ann = user("ANN1", "Ann");
        apply(&mut e, Reaction::Dislike, &ann, Utc::now());
        assert_eq!((e.total_likes, e.total_dislikes), (0, 1));
        apply(&mut e, Reaction::Like, &ann, Utc::now());
        assert_eq!((e.total_likes, e.total_dislikes), (1, 0));
        assert!(e.disliked_by.is_empty());
        assert_eq!(e.last_disliked_by, "");
    }

    #[test]
    fn last_disliked_falls_back_to_remaining_member() {
        let mut e = entry();
        apply(&mut e, Reaction::Dislike, &user("BOB2", "Bob"), Utc::now());
        apply(&mut e, Reaction::Dislike, &user("ANN1", "Ann"), Utc::now());
        assert_eq!(e.last_disliked_by, "Ann");
        apply(&mut e, Reaction::Like, &user("ANN1", "ann"), Utc::now());
        assert_eq!(e.disliked_by, vec!["BOB2".to_string()]);
        assert_eq!(e.last_disliked_by, "BOB2");
    }

    #[test]
    fn recomputed_pointer_clears_when_that_member_leaves() {
        let mut e = entry();
        apply(&mut e, Reaction::Dislike, &user("BOB2", "Bob"), Utc::now());
        apply(&mut e, Reaction::Dislike, &user("ANN1", "Ann"), Utc::now());
        apply(&mut e, Reaction::Like, &user("ANN1", "Ann"), Utc::now());
        assert_eq!(e.last_disliked_by, "BOB2");
        apply(&mut e, Reaction::Like, &user("BOB2", "Bob"), Utc::now());
        assert!(e.disliked_by.is_empty());
        assert_eq!(e.total_dislikes, 0);
        assert_eq!(e.last_disliked_by, "");
        assert_eq!(e.liked_by, vec!["ANN1".to_string(), "BOB2".to_string()]);
        assert_eq!(e.last_liked_by, "Bob");
    }

    #[test]
    fn untouched_last_pointer_survives_a_fresh_like() {
        let mut e = entry();
        apply(&mut e, Reaction::Dislike, &user("BOB2", "Bob"), Utc::now());
        apply(&mut e, Reaction::Like, &user("CAT3", "Bob"), Utc::now());
        assert_eq!(e.last_disliked_by, "Bob");
        assert_eq!(e.total_dislikes, 1);
    }

    #[test]
    fn reload_resets_everything() {
        let mut e = entry();
        apply(&mut e, Reaction::Like, &user("ANN1", "Ann"), Utc::now());
        apply(&mut e, Reaction::Dislike, &user("BOB2", "Bob"), Utc::now());
        let now = Utc::now();
        apply(&mut e, Reaction::Reload, &user("CAT3", "Cat"), now);
        assert_eq!((e.total_likes, e.total_dislikes), (0, 0));
        assert!(e.liked_by.is_empty() && e.disliked_by.is_empty());
        assert!(e.last_liked_by.is_empty() && e.last_disliked_by.is_empty());
        assert_eq!(e.updated_at, now);
        assert_eq!(e.summary, "Brake wear is...");
    }

    #[test]
    fn patch_omits_summary_unless_asked() {
        let e = entry();
        assert_eq!(patch_of(&e, false).summary, None);
        assert_eq!(patch_of(&e, true).summary.as_deref(), Some("Brake wear is..."));
    }
}
