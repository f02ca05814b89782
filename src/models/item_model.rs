//! Arena-backed item source.
//!
//! Rows live in a slot array. Removing a row tombstones its slot instead of
//! shifting the rows behind it, so `RowId` handles held elsewhere stay valid
//! until `compact()` runs. Every slot assignment gets a fresh generation, so a
//! stale handle can never alias a newer row.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::item::{Item, Url};

/// Generation-checked handle to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId {
    slot: u32,
    generation: u32,
}

impl RowId {
    pub fn slot(&self) -> u32 {
        self.slot
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    item: Option<Item>,
}

/// Structural change notification emitted by `ItemModel` mutations.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    RowsInserted { rows: Vec<RowId> },
    /// Snapshot of the removed rows, taken before their slots were tombstoned.
    RowsRemoved { items: Vec<(RowId, Item)> },
    DataChanged { rows: Vec<RowId> },
    /// Old to new handle mapping after tombstones were dropped.
    Compacted { remap: Vec<(RowId, RowId)> },
}

#[derive(Debug, Default)]
pub struct ItemModel {
    slots: Vec<Slot>,
    by_url: HashMap<Url, RowId>,
    next_generation: u32,
}

impl ItemModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let mut model = Self::new();
        model.append(items);
        model
    }

    /// Number of live rows.
    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }

    /// Number of tombstoned slots awaiting compaction.
    pub fn tombstones(&self) -> usize {
        self.slots.len() - self.len()
    }

    fn fresh_generation(&mut self) -> u32 {
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);
        generation
    }

    /// Append rows at the end. Items whose url is already present are skipped.
    pub fn append(&mut self, items: impl IntoIterator<Item = Item>) -> ModelEvent {
        let mut rows = Vec::new();
        for item in items {
            if self.by_url.contains_key(&item.url) {
                trace!(url = %item.url, "Skipping duplicate item");
                continue;
            }
            let row = RowId {
                slot: self.slots.len() as u32,
                generation: self.fresh_generation(),
            };
            self.by_url.insert(item.url.clone(), row);
            self.slots.push(Slot {
                generation: row.generation,
                item: Some(item),
            });
            rows.push(row);
        }
        ModelEvent::RowsInserted { rows }
    }

    pub fn get(&self, row: RowId) -> Option<&Item> {
        let slot = self.slots.get(row.slot as usize)?;
        if slot.generation != row.generation {
            return None;
        }
        slot.item.as_ref()
    }

    pub fn contains(&self, row: RowId) -> bool {
        self.get(row).is_some()
    }

    pub fn row_for_url(&self, url: &Url) -> Option<RowId> {
        self.by_url.get(url).copied()
    }

    /// Live rows in display order.
    pub fn iter(&self) -> impl Iterator<Item = (RowId, &Item)> + '_ {
        self.slots.iter().enumerate().filter_map(|(slot, s)| {
            s.item.as_ref().map(|item| {
                (
                    RowId {
                        slot: slot as u32,
                        generation: s.generation,
                    },
                    item,
                )
            })
        })
    }

    /// Row at a display position.
    pub fn nth(&self, position: usize) -> Option<RowId> {
        self.iter().nth(position).map(|(row, _)| row)
    }

    /// Tombstone rows. Invalid handles are ignored.
    pub fn remove(&mut self, rows: &[RowId]) -> ModelEvent {
        let mut items = Vec::with_capacity(rows.len());
        for &row in rows {
            if !self.contains(row) {
                trace!(?row, "Skipping invalid row");
                continue;
            }
            let generation = self.fresh_generation();
            let slot = &mut self.slots[row.slot as usize];
            slot.generation = generation;
            if let Some(item) = slot.item.take() {
                self.by_url.remove(&item.url);
                items.push((row, item));
            }
        }
        ModelEvent::RowsRemoved { items }
    }

    /// Update a row's modification time.
    pub fn set_modification_time(&mut self, row: RowId, mtime: i64) -> Option<ModelEvent> {
        let slot = self.slots.get_mut(row.slot as usize)?;
        if slot.generation != row.generation {
            return None;
        }
        slot.item.as_mut()?.mtime = mtime;
        Some(ModelEvent::DataChanged { rows: vec![row] })
    }

    /// Report a data change that leaves the items themselves untouched,
    /// e.g. when auxiliary metadata was fetched for them.
    pub fn touch(&self, rows: &[RowId]) -> ModelEvent {
        ModelEvent::DataChanged {
            rows: rows.iter().copied().filter(|r| self.contains(*r)).collect(),
        }
    }

    /// Drop tombstoned slots, renumbering the live rows.
    pub fn compact(&mut self) -> ModelEvent {
        let old_slots = std::mem::take(&mut self.slots);
        let mut remap = Vec::with_capacity(self.by_url.len());

        for (index, slot) in old_slots.into_iter().enumerate() {
            let Some(item) = slot.item else {
                continue;
            };
            let old = RowId {
                slot: index as u32,
                generation: slot.generation,
            };
            let new = RowId {
                slot: self.slots.len() as u32,
                generation: self.fresh_generation(),
            };
            self.by_url.insert(item.url.clone(), new);
            self.slots.push(Slot {
                generation: new.generation,
                item: Some(item),
            });
            remap.push((old, new));
        }

        debug!(rows = self.slots.len(), "Compacted item model");
        ModelEvent::Compacted { remap }
    }
}
