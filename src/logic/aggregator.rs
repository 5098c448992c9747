use crate::logic::types::{BlockEvent, MonitorState};

/// Fold one decoded block into the running counters
///
/// Every opportunity and every user record counts exactly once, whether or
/// not it later produces visible output. Counters saturate rather than wrap.
pub fn apply_block(state: MonitorState, event: &BlockEvent) -> MonitorState {
    let mut next = state;

    for _opportunity in &event.opportunities {
        next.total_opportunities = next.total_opportunities.saturating_add(1);
    }

    // Zero-profit users are still counted
    for _user in &event.user_records {
        next.total_users = next.total_users.saturating_add(1);
    }

    next.blocks_processed = next.blocks_processed.saturating_add(1);
    next
}

/// Fold a sequence of blocks, in order
pub fn apply_blocks<'a, I>(state: MonitorState, events: I) -> MonitorState
where
    I: IntoIterator<Item = &'a BlockEvent>,
{
    events.into_iter().fold(state, apply_block)
}
