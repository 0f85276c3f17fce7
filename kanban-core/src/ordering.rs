/// Sibling ordering inside a container: allocation, compaction and
/// intra-container repositioning.
///
/// Positions are 1-based and dense: a container with N children holds
/// exactly the positions `1..=N`. Each function here runs inside the caller's
/// transaction and assumes the container row is already locked exclusively,
/// so the read-then-write pairs cannot interleave with another writer.
use crate::storage::{StorageError, Transaction};
use crate::types::Container;

/// Append position for a new child: `max(position) + 1`, or 1 when empty.
/// `exclude` leaves one child (the one being placed) out of the scan.
pub async fn next_position(
    tx: &mut dyn Transaction,
    container: Container<'_>,
    exclude: Option<&str>,
) -> Result<i32, StorageError> {
    let max = tx.max_position(container, exclude).await?;
    let position = max + 1;
    log::debug!(
        target: "kanban.ordering.allocate",
        "Allocated position {} in {} {}",
        position,
        container.kind(),
        container.id()
    );
    Ok(position)
}

/// Shift every child after `vacated` down by one, closing the gap a removal
/// or departure left behind.
pub async fn close_gap(
    tx: &mut dyn Transaction,
    container: Container<'_>,
    vacated: i32,
) -> Result<u64, StorageError> {
    let shifted = tx.shift_positions(container, vacated + 1, -1, None).await?;
    log::debug!(
        target: "kanban.ordering.compact",
        "Closed gap at {} in {} {} ({} shifted)",
        vacated,
        container.kind(),
        container.id(),
        shifted
    );
    Ok(shifted)
}

/// Move one child from `current` to `requested` within its container and
/// return the position it ends up at. The child's own row is not written.
///
/// `requested` is clamped to `1..=N`, where N counts the child itself. The
/// gap at `current` is closed first, then a slot is opened at the target,
/// both excluding the child.
pub async fn reposition(
    tx: &mut dyn Transaction,
    container: Container<'_>,
    child_id: &str,
    current: i32,
    requested: i32,
) -> Result<i32, StorageError> {
    // Dense positions: the highest one is the child count.
    let count = tx.max_position(container, None).await?;
    let target = requested.clamp(1, count.max(current));
    if target == current {
        return Ok(current);
    }

    tx.shift_positions(container, current + 1, -1, Some(child_id))
        .await?;
    tx.shift_positions(container, target, 1, Some(child_id))
        .await?;

    log::debug!(
        target: "kanban.ordering.reposition",
        "Repositioned {} from {} to {} in {} {}",
        child_id,
        current,
        target,
        container.kind(),
        container.id()
    );
    Ok(target)
}

/// True when `positions` is exactly `1..=len` in some order.
pub fn is_dense<I>(positions: I) -> bool
where
    I: IntoIterator<Item = i32>,
{
    let mut positions: Vec<i32> = positions.into_iter().collect();
    positions.sort_unstable();
    positions
        .iter()
        .enumerate()
        .all(|(index, &position)| position == index as i32 + 1)
}
