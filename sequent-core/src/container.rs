use crate::component::Component;
use crate::core_result::ContainerError;
use crate::core_result::CoreResult;
use crate::registry::type_id_of;
use crate::registry::ComponentType;
use log::error;
use log::trace;
use std::any::Any;
use std::mem;

/// Sequence tag shared by every static row.
///
/// This is also the first id a fresh `EntityIdSource` hands out. The overlap
/// is harmless: a container is either static or normal, never both, so a
/// static row can never collide with entity `1`'s rows inside one container.
pub const STATIC_SEQUENCE: u64 = 1;

/// Reserved "no row here" sequence. Never stored.
pub const INVALID_SEQUENCE: u64 = 0;

/// One stored component tagged with its sequence. For normal containers the
/// sequence is the owning entity id; for static containers it is
/// `STATIC_SEQUENCE`.
#[derive(Debug, Clone)]
pub struct Row<T> {
    pub sequence: u64,
    pub value: T,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum RemovalKind {
    All,
    First,
    Last,
    AtIndex(usize),
}

#[derive(Debug)]
struct Removal {
    sequence: u64,
    kind: RemovalKind,
}

struct Modification<T> {
    value: T,
    index: usize,
    priority: i32,
}

/// Type-erased container surface. `ContainerMap` stores boxed instances of
/// this trait and the walker drives the join through it; typed access goes
/// through `as_any` downcasting.
pub trait ContainerBase {
    fn component_type(&self) -> ComponentType;

    fn component_name(&self) -> &'static str;

    /// Commits staged mutations: modifications, then additions, then
    /// removals.
    fn renormalize(&mut self, stable_sort: bool);

    /// Sequence of row 0, `0` if empty. Refreshed by `renormalize`.
    fn lower_sequence(&self) -> u64;

    /// Sequence of the last sorted row, `0` if empty. Refreshed by
    /// `renormalize`.
    fn upper_sequence(&self) -> u64;

    /// Number of sorted rows. Staged additions are invisible here until the
    /// next `renormalize`.
    fn num_rows(&self) -> usize;

    /// Sequence of the sorted row at `index`, or `0` when out of range.
    fn seq_at(&self, index: usize) -> u64;

    /// Index of the first sorted row tagged `sequence`. Always `Some(0)` for
    /// a static container with sorted rows, whatever the sequence; `None`
    /// while nothing is sorted in.
    fn lookup_index(&self, sequence: u64) -> Option<usize>;

    /// Rows tagged `sequence`, counting staged additions as well. Useful for
    /// debugging whether a system's requirements are met pre-normalize.
    fn num_rows_with_sequence(&self, sequence: u64) -> usize;

    fn is_static(&self) -> bool;

    fn remove_sequence(&mut self, sequence: u64);

    fn remove_first_sequence(&mut self, sequence: u64);

    fn remove_last_sequence(&mut self, sequence: u64);

    fn remove_sequence_at(&mut self, sequence: u64, index: usize);

    /// Destroys all rows immediately, invoking `on_destruct` for every row
    /// of the sorted active set.
    fn clear(&mut self);

    /// Invokes the `serialize` hook of every stored row, staged additions
    /// included.
    fn serialize_rows(&self, sink: &mut dyn Any);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Sorted columnar storage for one component type.
///
/// Mutations are staged: additions append to an unsorted tail, removals and
/// modifications queue descriptors. Nothing is observable through the sorted
/// surface until `renormalize` commits the lot in a fixed order
/// (modifications, additions, removals), so every system in a phase acts on
/// the same data.
pub struct ComponentContainer<T: Component> {
    rows: Vec<Row<T>>,
    removals: Vec<Removal>,
    modifications: Vec<Modification<T>>,
    static_mode: bool,
    last_sorted_len: usize,
    lower_sequence: u64,
    upper_sequence: u64,
}

impl<T: Component> Default for ComponentContainer<T> {
    fn default() -> Self {
        ComponentContainer::new()
    }
}

impl<T: Component> ComponentContainer<T> {
    pub fn new() -> ComponentContainer<T> {
        ComponentContainer {
            rows: vec![],
            removals: vec![],
            modifications: vec![],
            static_mode: false,
            last_sorted_len: 0,
            lower_sequence: INVALID_SEQUENCE,
            upper_sequence: INVALID_SEQUENCE,
        }
    }

    /// Stages a row for `sequence`. Panics on structural misuse (sequence
    /// `0`, or a static container); see `try_add` for the checked variant.
    pub fn add(&mut self, sequence: u64, value: T) {
        if let Err(err) = self.try_add(sequence, value) {
            error!("cannot add {} row: {}", T::name(), err);
            panic!("cannot add {} row: {}", T::name(), err);
        }
    }

    pub fn try_add(&mut self, sequence: u64, value: T) -> CoreResult {
        if sequence == INVALID_SEQUENCE {
            return Err(ContainerError::InvalidSequence);
        }
        if self.static_mode {
            return Err(ContainerError::NormalRowInStaticContainer);
        }
        trace!("staging {} row for sequence {}", T::name(), sequence);
        self.rows.push(Row { sequence, value });
        Ok(())
    }

    /// Stages a static row and returns its insertion index. Panics if the
    /// container already holds entity rows; see `try_add_static`.
    pub fn add_static(&mut self, value: T) -> usize {
        match self.try_add_static(value) {
            Ok(index) => index,
            Err(err) => {
                error!("cannot add static {} row: {}", T::name(), err);
                panic!("cannot add static {} row: {}", T::name(), err);
            }
        }
    }

    pub fn try_add_static(&mut self, value: T) -> CoreResult<usize> {
        if !self.static_mode {
            if !self.rows.is_empty() {
                return Err(ContainerError::StaticRowInNormalContainer);
            }
            self.static_mode = true;
        }
        let index = self.rows.len();
        trace!("staging static {} row at index {}", T::name(), index);
        self.rows.push(Row {
            sequence: STATIC_SEQUENCE,
            value,
        });
        Ok(index)
    }

    /// Stages an overwrite of the sorted row at `index`. Conflicting
    /// modifications are resolved at normalize time by priority.
    pub fn modify(&mut self, index: usize, value: T, priority: i32) {
        self.modifications.push(Modification {
            value,
            index,
            priority,
        });
    }

    pub fn remove_all(&mut self, sequence: u64) {
        self.removals.push(Removal {
            sequence,
            kind: RemovalKind::All,
        });
    }

    pub fn remove_first(&mut self, sequence: u64) {
        self.removals.push(Removal {
            sequence,
            kind: RemovalKind::First,
        });
    }

    pub fn remove_last(&mut self, sequence: u64) {
        self.removals.push(Removal {
            sequence,
            kind: RemovalKind::Last,
        });
    }

    pub fn remove_at(&mut self, sequence: u64, index: usize) {
        self.removals.push(Removal {
            sequence,
            kind: RemovalKind::AtIndex(index),
        });
    }

    fn run_start(&self, sequence: u64) -> usize {
        self.rows[..self.last_sorted_len].partition_point(|row| row.sequence < sequence)
    }

    pub fn lookup_index(&self, sequence: u64) -> Option<usize> {
        if self.last_sorted_len == 0 {
            return None;
        }
        // Static rows are the same for every entity; the first index stands
        // in for any sequence.
        if self.static_mode {
            return Some(0);
        }
        let index = self.run_start(sequence);
        if index < self.last_sorted_len && self.rows[index].sequence == sequence {
            Some(index)
        } else {
            None
        }
    }

    pub fn get(&self, sequence: u64) -> Option<&T> {
        let index = self.lookup_index(sequence)?;
        Some(&self.rows[index].value)
    }

    pub fn get_mut(&mut self, sequence: u64) -> Option<&mut T> {
        let index = self.lookup_index(sequence)?;
        Some(&mut self.rows[index].value)
    }

    pub fn row_at(&self, index: usize) -> Option<&Row<T>> {
        if index < self.last_sorted_len {
            self.rows.get(index)
        } else {
            None
        }
    }

    pub fn seq_at(&self, index: usize) -> u64 {
        if index < self.last_sorted_len {
            self.rows[index].sequence
        } else {
            INVALID_SEQUENCE
        }
    }

    pub fn num_rows(&self) -> usize {
        self.last_sorted_len
    }

    pub fn num_rows_with_sequence(&self, sequence: u64) -> usize {
        let start = self.run_start(sequence);
        let sorted = self.rows[start..self.last_sorted_len]
            .iter()
            .take_while(|row| row.sequence == sequence)
            .count();
        let staged = self.rows[self.last_sorted_len..]
            .iter()
            .filter(|row| row.sequence == sequence)
            .count();
        sorted + staged
    }

    pub fn lower_sequence(&self) -> u64 {
        self.lower_sequence
    }

    pub fn upper_sequence(&self) -> u64 {
        self.upper_sequence
    }

    pub fn is_static(&self) -> bool {
        self.static_mode
    }

    /// Whole backing array, staged additions included. Sorted-surface
    /// accessors stop at `num_rows`.
    pub fn rows(&self) -> &[Row<T>] {
        &self.rows
    }

    /// Mutable view of the whole backing array. Values may be edited freely
    /// between walks; sequences must be left alone.
    pub fn rows_mut(&mut self) -> &mut [Row<T>] {
        &mut self.rows
    }

    pub fn backing_len(&self) -> usize {
        self.rows.len()
    }

    /// Commits staged mutations in the fixed order: modifications (they
    /// address positional indices that additions and removals would shift),
    /// then additions, then removals (so a row added and removed in the same
    /// phase still gets its construct/destruct pair).
    pub fn renormalize(&mut self, stable_sort: bool) {
        self.apply_modifications();
        self.apply_additions(stable_sort);
        self.apply_removals();
    }

    fn apply_modifications(&mut self) {
        if self.modifications.is_empty() {
            return;
        }
        let mut pending = mem::take(&mut self.modifications);
        // Stable by index: among entries with equal index and equal priority
        // the last-enqueued one wins.
        pending.sort_by_key(|modification| modification.index);
        let mut pending = pending.into_iter().peekable();
        while let Some(mut chosen) = pending.next() {
            while let Some(next) = pending.peek() {
                if next.index != chosen.index {
                    break;
                }
                let next = pending.next().unwrap();
                if next.priority >= chosen.priority {
                    chosen = next;
                }
            }
            if chosen.index < self.last_sorted_len {
                self.rows[chosen.index].value = chosen.value;
            } else {
                error!(
                    "{}: dropping modification for out-of-range row index {}",
                    T::name(),
                    chosen.index
                );
            }
        }
    }

    fn apply_additions(&mut self, stable_sort: bool) {
        if self.rows.is_empty() {
            self.last_sorted_len = 0;
            self.lower_sequence = INVALID_SEQUENCE;
            self.upper_sequence = INVALID_SEQUENCE;
            return;
        }
        if self.last_sorted_len != self.rows.len() {
            for row in &mut self.rows[self.last_sorted_len..] {
                row.value.on_construct(row.sequence);
            }
            // Static rows always stable-sort so insertion indices stay
            // meaningful.
            if stable_sort || self.static_mode {
                self.rows.sort_by_key(|row| row.sequence);
            } else {
                self.rows.sort_unstable_by_key(|row| row.sequence);
            }
            self.last_sorted_len = self.rows.len();
        }
        self.lower_sequence = self.rows[0].sequence;
        self.upper_sequence = self.rows[self.rows.len() - 1].sequence;
    }

    fn apply_removals(&mut self) {
        if self.removals.is_empty() {
            return;
        }
        for removal in mem::take(&mut self.removals) {
            match removal.kind {
                RemovalKind::All => {
                    // Erasure shifts the run down, so the same index is
                    // re-tested until the run is gone.
                    let index = self.run_start(removal.sequence);
                    while index < self.last_sorted_len
                        && self.rows[index].sequence == removal.sequence
                    {
                        self.destroy_row(index);
                    }
                }
                RemovalKind::First => {
                    let index = self.run_start(removal.sequence);
                    if index < self.last_sorted_len
                        && self.rows[index].sequence == removal.sequence
                    {
                        self.destroy_row(index);
                    }
                }
                RemovalKind::Last => {
                    let start = self.run_start(removal.sequence);
                    let mut end = start;
                    while end < self.last_sorted_len && self.rows[end].sequence == removal.sequence
                    {
                        end += 1;
                    }
                    if end > start {
                        self.destroy_row(end - 1);
                    }
                }
                RemovalKind::AtIndex(index) => {
                    if index < self.last_sorted_len
                        && self.rows[index].sequence == removal.sequence
                    {
                        self.destroy_row(index);
                    }
                }
            }
        }

        // Erasures may have shifted either end of the sorted prefix.
        if self.last_sorted_len == 0 {
            self.lower_sequence = INVALID_SEQUENCE;
            self.upper_sequence = INVALID_SEQUENCE;
        } else {
            self.lower_sequence = self.rows[0].sequence;
            self.upper_sequence = self.rows[self.last_sorted_len - 1].sequence;
        }
    }

    fn destroy_row(&mut self, index: usize) {
        let mut row = self.rows.remove(index);
        self.last_sorted_len -= 1;
        row.value.on_destruct(row.sequence);
    }

    /// Destroys all rows immediately. Rows of the sorted active set get
    /// their `on_destruct`; staged additions were never constructed and die
    /// silently.
    pub fn clear(&mut self) {
        trace!("clearing {} container", T::name());
        self.teardown();
        self.rows.clear();
        self.removals.clear();
        self.modifications.clear();
        self.last_sorted_len = 0;
        self.lower_sequence = INVALID_SEQUENCE;
        self.upper_sequence = INVALID_SEQUENCE;
    }

    fn teardown(&mut self) {
        for row in &mut self.rows[..self.last_sorted_len] {
            row.value.on_destruct(row.sequence);
        }
    }
}

impl<T: Component> Drop for ComponentContainer<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<T: Component> ContainerBase for ComponentContainer<T> {
    fn component_type(&self) -> ComponentType {
        type_id_of::<T>()
    }

    fn component_name(&self) -> &'static str {
        T::name()
    }

    fn renormalize(&mut self, stable_sort: bool) {
        ComponentContainer::renormalize(self, stable_sort);
    }

    fn lower_sequence(&self) -> u64 {
        ComponentContainer::lower_sequence(self)
    }

    fn upper_sequence(&self) -> u64 {
        ComponentContainer::upper_sequence(self)
    }

    fn num_rows(&self) -> usize {
        ComponentContainer::num_rows(self)
    }

    fn seq_at(&self, index: usize) -> u64 {
        ComponentContainer::seq_at(self, index)
    }

    fn lookup_index(&self, sequence: u64) -> Option<usize> {
        ComponentContainer::lookup_index(self, sequence)
    }

    fn num_rows_with_sequence(&self, sequence: u64) -> usize {
        ComponentContainer::num_rows_with_sequence(self, sequence)
    }

    fn is_static(&self) -> bool {
        ComponentContainer::is_static(self)
    }

    fn remove_sequence(&mut self, sequence: u64) {
        self.remove_all(sequence);
    }

    fn remove_first_sequence(&mut self, sequence: u64) {
        self.remove_first(sequence);
    }

    fn remove_last_sequence(&mut self, sequence: u64) {
        self.remove_last(sequence);
    }

    fn remove_sequence_at(&mut self, sequence: u64, index: usize) {
        self.remove_at(sequence, index);
    }

    fn clear(&mut self) {
        ComponentContainer::clear(self);
    }

    fn serialize_rows(&self, sink: &mut dyn Any) {
        for row in &self.rows {
            row.value.serialize(sink, row.sequence);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
