//! Queue position allocation and compaction.
//!
//! Positions of queued posts are always exactly `1..=N`. New posts take
//! `max + 1`; every removal is followed by a renumbering pass that compacts
//! the survivors without reordering them. Both helpers are pure and work on
//! whatever snapshot the caller holds under its lock.

use super::post::Post;
use super::PostId;

/// Next free FIFO slot: `max(position) + 1`, or 1 for an empty queue.
pub fn next_position<'a, I>(posts: I) -> u32
where
    I: IntoIterator<Item = &'a Post>,
{
    posts
        .into_iter()
        .filter_map(|p| p.state.queue_position())
        .max()
        .map_or(1, |max| max.saturating_add(1))
}

/// Dense assignment for the queued posts in `posts`: ordered by current
/// position (ties by id), numbered from 1. Includes unchanged members.
pub fn renumber_plan<'a, I>(posts: I) -> Vec<(PostId, u32)>
where
    I: IntoIterator<Item = &'a Post>,
{
    let mut members: Vec<(u32, PostId)> = posts
        .into_iter()
        .filter_map(|p| p.state.queue_position().map(|pos| (pos, p.id)))
        .collect();
    members.sort_unstable();
    members
        .into_iter()
        .zip(1u32..)
        .map(|((_, id), position)| (id, position))
        .collect()
}

/// Returns `true` when `positions` is exactly `{1, …, len}`.
#[must_use]
pub fn is_dense(positions: &[u32]) -> bool {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted.iter().zip(1u32..).all(|(&p, expected)| p == expected)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::post::{Payment, PostContent};
    use crate::domain::post_state::PostState;

    fn post(id: i64, state: PostState) -> Post {
        Post {
            id: PostId::new(id),
            owner_id: 1,
            state,
            payment: Payment::default(),
            content: PostContent::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_queue_starts_at_one() {
        let posts = [post(1, PostState::Draft)];
        assert_eq!(next_position(&posts), 1);
    }

    #[test]
    fn next_position_is_max_plus_one() {
        let posts = [
            post(1, PostState::Queued { position: 1 }),
            post(2, PostState::Queued { position: 4 }),
            post(3, PostState::Draft),
        ];
        assert_eq!(next_position(&posts), 5);
    }

    #[test]
    fn renumber_compacts_without_reordering() {
        let posts = [
            post(7, PostState::Queued { position: 5 }),
            post(3, PostState::Queued { position: 2 }),
            post(9, PostState::Draft),
            post(4, PostState::Queued { position: 9 }),
        ];
        let plan = renumber_plan(&posts);
        assert_eq!(
            plan,
            vec![
                (PostId::new(3), 1),
                (PostId::new(7), 2),
                (PostId::new(4), 3)
            ]
        );
    }

    #[test]
    fn renumber_breaks_ties_by_id() {
        let posts = [
            post(8, PostState::Queued { position: 1 }),
            post(2, PostState::Queued { position: 1 }),
        ];
        let plan = renumber_plan(&posts);
        assert_eq!(plan, vec![(PostId::new(2), 1), (PostId::new(8), 2)]);
    }

    #[test]
    fn density_check() {
        assert!(is_dense(&[]));
        assert!(is_dense(&[2, 1, 3]));
        assert!(!is_dense(&[1, 3]));
        assert!(!is_dense(&[1, 1]));
    }
}
