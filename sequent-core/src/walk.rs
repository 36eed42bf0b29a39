use crate::component_set::ComponentSet;
use crate::container::ContainerBase;
use crate::container::INVALID_SEQUENCE;
use crate::container::STATIC_SEQUENCE;
use crate::container_map::ContainerMap;
use crate::registry::ComponentType;
use crate::system::System;
use log::trace;
use std::collections::BTreeSet;
use tinyvec::TinyVec;

/// One type's contribution at a visited target: nothing, a run of matching
/// rows in the sorted prefix, or the full static array.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum RunSpan {
    #[default]
    Missing,
    Rows {
        start: usize,
        len: usize,
    },
    Static {
        len: usize,
    },
}

struct Column<'a> {
    container: &'a dyn ContainerBase,
    optional: bool,
    is_static: bool,
    num_rows: usize,
    index: usize,
    next_index: usize,
}

fn build_columns<'a, S: System>(
    map: &'a ContainerMap,
    system: &S,
    component_types: &[ComponentType],
) -> Vec<Column<'a>> {
    component_types
        .iter()
        .map(|component_type| {
            let container = map
                .base_container(*component_type)
                .expect("containers are ensured before a walk");
            Column {
                optional: system.is_optional(*component_type),
                is_static: container.is_static(),
                num_rows: container.num_rows(),
                index: 0,
                next_index: 0,
                container,
            }
        })
        .collect()
}

fn assert_distinct(component_types: &[ComponentType]) {
    for (position, component_type) in component_types.iter().enumerate() {
        if component_types[..position].contains(component_type) {
            panic!(
                "system declares component type {} more than once",
                component_type
            );
        }
    }
}

/// Visits every entity matching the system's component tuple in ascending
/// sequence order and dispatches at each one.
pub(crate) fn walk_components<S: System>(map: &mut ContainerMap, system: &mut S) {
    if S::Components::LEN == 0 {
        return;
    }
    // Ensure even never-seen containers exist; an empty container can still
    // back an optional component.
    S::Components::ensure_containers(map);
    let component_types = S::Components::component_types();
    assert_distinct(&component_types);
    trace!("walking {} column(s)", component_types.len());

    let map = &*map;
    let group = system.group_components();
    let mut columns = build_columns(map, &*system, &component_types);

    // Pick the leader: the mandatory non-static column with the smallest
    // upper sequence bounds the iteration space. An empty mandatory column
    // ends the walk before any callback.
    let mut leader = None;
    let mut lowest_upper_sequence = u64::MAX;
    for (position, column) in columns.iter().enumerate() {
        if column.num_rows == 0 && !column.optional {
            return;
        }
        if column.optional || column.is_static {
            continue;
        }
        if column.container.upper_sequence() < lowest_upper_sequence {
            lowest_upper_sequence = column.container.upper_sequence();
            leader = Some(position);
        }
    }

    let typed = S::Components::columns(map);
    match leader {
        Some(leader) => walk_with_leader::<S>(system, typed, &mut columns, leader, group),
        None => walk_all_optional::<S>(system, typed, &mut columns, group),
    }
}

fn walk_with_leader<S: System>(
    system: &mut S,
    typed: <S::Components as ComponentSet>::Columns<'_>,
    columns: &mut [Column<'_>],
    leader: usize,
    group: bool,
) {
    let mut target = columns[leader].container.seq_at(columns[leader].index);
    while target != INVALID_SEQUENCE {
        // Advance every other non-static column forward to the target.
        let mut failed = false;
        for column in columns.iter_mut() {
            if column.is_static {
                continue;
            }
            let mut current = column.container.seq_at(column.index);
            while current < target && column.index != column.num_rows {
                column.index += 1;
                if column.index == column.num_rows {
                    if !column.optional {
                        // A mandatory column ran dry; the walk is over.
                        return;
                    }
                    break;
                }
                current = column.container.seq_at(column.index);
            }
            if current != target && !column.optional {
                failed = true;
                break;
            }
        }

        if !failed {
            let end_reached = dispatch_at::<S>(system, typed, columns, group, target);
            for column in columns.iter_mut() {
                if !column.is_static {
                    column.index = column.next_index.max(column.index);
                }
            }
            if end_reached {
                return;
            }
        }

        // Advance the leader past the current target's run and pick the next
        // target from it.
        while columns[leader].container.seq_at(columns[leader].index) == target {
            columns[leader].index += 1;
            if columns[leader].index == columns[leader].num_rows {
                return;
            }
        }
        target = columns[leader].container.seq_at(columns[leader].index);
    }
}

/// Walk used when every column is optional or static: the target stream is
/// the sorted union of all non-static sequences.
fn walk_all_optional<S: System>(
    system: &mut S,
    typed: <S::Components as ComponentSet>::Columns<'_>,
    columns: &mut [Column<'_>],
    group: bool,
) {
    let mut sequence_set = BTreeSet::new();
    for column in columns.iter() {
        if column.is_static {
            continue;
        }
        for index in 0..column.num_rows {
            sequence_set.insert(column.container.seq_at(index));
        }
    }

    if sequence_set.is_empty() {
        // Purely static systems dispatch exactly once.
        if columns.iter().all(|column| column.is_static) {
            dispatch_at::<S>(system, typed, columns, group, STATIC_SEQUENCE);
        }
        return;
    }

    for target in sequence_set {
        for column in columns.iter_mut() {
            if column.is_static {
                continue;
            }
            let mut current = column.container.seq_at(column.index);
            while current < target && column.index != column.num_rows {
                column.index += 1;
                if column.index == column.num_rows {
                    break;
                }
                current = column.container.seq_at(column.index);
            }
        }

        let end_reached = dispatch_at::<S>(system, typed, columns, group, target);
        for column in columns.iter_mut() {
            if !column.is_static {
                column.index = column.next_index.max(column.index);
            }
        }
        if end_reached {
            return;
        }
    }
}

/// Force-executes the system against one entity. Returns false when the
/// entity lacks a mandatory component.
pub(crate) fn walk_entity<S: System>(map: &mut ContainerMap, system: &mut S, entity: u64) -> bool {
    if S::Components::LEN == 0 {
        return false;
    }
    S::Components::ensure_containers(map);
    let component_types = S::Components::component_types();
    assert_distinct(&component_types);
    trace!("walking entity {}", entity);

    let map = &*map;
    let group = system.group_components();
    let mut columns = build_columns(map, &*system, &component_types);

    for column in columns.iter_mut() {
        match column.container.lookup_index(entity) {
            Some(index) => column.index = index,
            None => {
                if !column.optional {
                    return false;
                }
                // Absent optional: park the cursor at the end so dispatch
                // passes a null.
                column.index = column.num_rows;
            }
        }
    }

    let typed = S::Components::columns(map);
    dispatch_at::<S>(system, typed, &mut columns, group, entity);
    true
}

fn run_span(column: &Column<'_>, target: u64) -> RunSpan {
    if column.is_static {
        if column.num_rows > 0 {
            return RunSpan::Static {
                len: column.num_rows,
            };
        }
        return RunSpan::Missing;
    }
    if column.index >= column.num_rows || column.container.seq_at(column.index) != target {
        return RunSpan::Missing;
    }
    let mut end = column.index + 1;
    while end < column.num_rows && column.container.seq_at(end) == target {
        end += 1;
    }
    RunSpan::Rows {
        start: column.index,
        len: end - column.index,
    }
}

/// Dispatches the system at one target: once per element of the Cartesian
/// product of the per-column runs (recurse mode, rightmost column varying
/// fastest), or once with full run views (group mode). Advances each
/// column's next cursor past its consumed run and reports whether a
/// mandatory column has exhausted its rows, so the outer walk can stop.
fn dispatch_at<S: System>(
    system: &mut S,
    typed: <S::Components as ComponentSet>::Columns<'_>,
    columns: &mut [Column<'_>],
    group: bool,
    target: u64,
) -> bool {
    let mut spans: TinyVec<[RunSpan; 8]> = Default::default();
    for column in columns.iter() {
        spans.push(run_span(column, target));
    }

    // A mandatory column contributing nothing suppresses the callbacks.
    let runnable = columns
        .iter()
        .zip(spans.iter())
        .all(|(column, span)| column.optional || !matches!(span, RunSpan::Missing));

    if runnable {
        if group {
            S::Components::invoke_group(system, typed, &spans, target);
        } else {
            let mut counts: TinyVec<[usize; 8]> = Default::default();
            for span in spans.iter() {
                counts.push(match *span {
                    RunSpan::Missing => 1,
                    RunSpan::Rows { len, .. } => len,
                    RunSpan::Static { len } => len,
                });
            }
            for_each_product(&counts, |cursors| {
                S::Components::invoke_recurse(system, typed, &spans, cursors, target);
            });
        }
    }

    let mut end_reached = false;
    for (column, span) in columns.iter_mut().zip(spans.iter()) {
        if column.is_static {
            continue;
        }
        match *span {
            RunSpan::Rows { start, len } => {
                column.next_index = column.next_index.max(start + len);
                if start + len == column.num_rows && !column.optional {
                    end_reached = true;
                }
            }
            RunSpan::Missing => {
                column.next_index = column.next_index.max(column.index);
                if column.index >= column.num_rows && !column.optional {
                    end_reached = true;
                }
            }
            RunSpan::Static { .. } => {}
        }
    }
    end_reached
}

fn for_each_product(counts: &[usize], mut visit: impl FnMut(&[usize])) {
    let mut cursors: TinyVec<[usize; 8]> = counts.iter().map(|_| 0).collect();
    loop {
        visit(&cursors);
        // Odometer increment, rightmost column varying fastest.
        let mut position = counts.len();
        loop {
            if position == 0 {
                return;
            }
            position -= 1;
            cursors[position] += 1;
            if cursors[position] < counts[position] {
                break;
            }
            cursors[position] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_varies_rightmost_fastest() {
        let mut seen = vec![];
        for_each_product(&[2, 3], |cursors| seen.push((cursors[0], cursors[1])));
        assert_eq!(
            seen,
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
        );
    }

    #[test]
    fn product_of_single_choices_fires_once() {
        let mut calls = 0;
        for_each_product(&[1, 1, 1], |_| calls += 1);
        assert_eq!(calls, 1);
    }
}
