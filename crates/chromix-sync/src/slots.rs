//! Last-committed resource slots, one per hardware stage instance.
//!
//! The slot table is the synchronizer's memory of what the hardware is
//! currently holding: the blob handle most recently committed for every
//! (display, stage) and (unit, stage) pair. Overwriting a slot retires the
//! previous occupant on the device — the no-leak guarantee lives here, not
//! in callers. Not thread-safe; the owning synchronizer serializes access.

use chromix_core::stage::{DisplayStage, UnitStage};

use crate::transport::{BlobId, CommitTransport};

/// Addresses one slot in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKey {
    /// A display-level singleton stage.
    Display(DisplayStage),
    /// A per-unit stage on the unit with the given index.
    Unit(usize, UnitStage),
}

/// Table of last-committed blob handles.
#[derive(Debug)]
pub struct ResourceSlotTable {
    display: [BlobId; DisplayStage::ALL.len()],
    units: Vec<[BlobId; UnitStage::ALL.len()]>,
}

impl ResourceSlotTable {
    pub fn new(unit_count: usize) -> Self {
        Self {
            display: [BlobId::NONE; DisplayStage::ALL.len()],
            units: vec![[BlobId::NONE; UnitStage::ALL.len()]; unit_count],
        }
    }

    /// Handle last committed for `key`, or [`BlobId::NONE`] if the slot was
    /// never set. An out-of-range unit index reads as empty.
    pub fn get(&self, key: SlotKey) -> BlobId {
        match key {
            SlotKey::Display(stage) => self.display[stage as usize],
            SlotKey::Unit(unit, stage) => match self.units.get(unit) {
                Some(slots) => slots[stage as usize],
                None => {
                    tracing::warn!("slot read for unknown unit {unit}");
                    BlobId::NONE
                }
            },
        }
    }

    /// Store `id` in the slot for `key`, retiring a differing non-zero
    /// previous occupant on the device.
    pub fn set(&mut self, transport: &mut dyn CommitTransport, key: SlotKey, id: BlobId) {
        let slot = match key {
            SlotKey::Display(stage) => &mut self.display[stage as usize],
            SlotKey::Unit(unit, stage) => match self.units.get_mut(unit) {
                Some(slots) => &mut slots[stage as usize],
                None => {
                    tracing::warn!("slot write for unknown unit {unit}");
                    return;
                }
            },
        };

        let old = *slot;
        *slot = id;
        if !old.is_none() && old != id {
            transport.destroy_blob(old);
        }
    }

    /// Retire every occupied slot. Required on display reconnect or any
    /// other reinitialization path, where reusing stored handles would alias
    /// resources the device no longer knows about.
    pub fn clear_all(&mut self, transport: &mut dyn CommitTransport) {
        for stage in DisplayStage::ALL {
            self.set(transport, SlotKey::Display(stage), BlobId::NONE);
        }
        for unit in 0..self.units.len() {
            for stage in UnitStage::ALL {
                self.set(transport, SlotKey::Unit(unit, stage), BlobId::NONE);
            }
        }
    }

    /// Number of slots currently holding a non-zero handle.
    pub fn occupied(&self) -> usize {
        let display = self.display.iter().filter(|id| !id.is_none()).count();
        let units = self
            .units
            .iter()
            .flat_map(|slots| slots.iter())
            .filter(|id| !id.is_none())
            .count();
        display + units
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{CommitTarget, PropertyTag, PropertyValue, TransportError};

    #[derive(Default)]
    struct RecordingTransport {
        destroyed: Vec<BlobId>,
    }

    impl CommitTransport for RecordingTransport {
        fn create_blob(&mut self, _bytes: &[u8]) -> Result<BlobId, TransportError> {
            unreachable!("slot table never creates blobs")
        }

        fn destroy_blob(&mut self, id: BlobId) {
            self.destroyed.push(id);
        }

        fn stage_property(
            &mut self,
            _target: CommitTarget,
            _prop: PropertyTag,
            _value: PropertyValue,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        fn commit(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn test_empty_slot_reads_as_none() {
        let table = ResourceSlotTable::new(2);
        assert!(table.get(SlotKey::Display(DisplayStage::CgcLut)).is_none());
        assert!(table.get(SlotKey::Unit(1, UnitStage::OetfLut)).is_none());
    }

    #[test]
    fn test_overwrite_retires_previous_occupant() {
        let mut table = ResourceSlotTable::new(1);
        let mut transport = RecordingTransport::default();
        let key = SlotKey::Unit(0, UnitStage::EotfLut);

        table.set(&mut transport, key, BlobId::new(10));
        assert!(transport.destroyed.is_empty());

        table.set(&mut transport, key, BlobId::new(11));
        assert_eq!(transport.destroyed, vec![BlobId::new(10)]);
        assert_eq!(table.get(key), BlobId::new(11));
    }

    #[test]
    fn test_clearing_a_slot_retires_it_once() {
        let mut table = ResourceSlotTable::new(1);
        let mut transport = RecordingTransport::default();
        let key = SlotKey::Display(DisplayStage::RegammaLut);

        table.set(&mut transport, key, BlobId::new(5));
        table.set(&mut transport, key, BlobId::NONE);
        table.set(&mut transport, key, BlobId::NONE);
        assert_eq!(transport.destroyed, vec![BlobId::new(5)]);
    }

    #[test]
    fn test_clear_all_retires_every_occupied_slot() {
        let mut table = ResourceSlotTable::new(2);
        let mut transport = RecordingTransport::default();

        table.set(
            &mut transport,
            SlotKey::Display(DisplayStage::CgcLut),
            BlobId::new(1),
        );
        table.set(
            &mut transport,
            SlotKey::Unit(0, UnitStage::GamutMatrix),
            BlobId::new(2),
        );
        table.set(
            &mut transport,
            SlotKey::Unit(1, UnitStage::ToneMap),
            BlobId::new(3),
        );
        assert_eq!(table.occupied(), 3);

        table.clear_all(&mut transport);
        assert_eq!(table.occupied(), 0);
        assert_eq!(transport.destroyed.len(), 3);
    }

    #[test]
    fn test_out_of_range_unit_is_ignored() {
        let mut table = ResourceSlotTable::new(1);
        let mut transport = RecordingTransport::default();
        table.set(
            &mut transport,
            SlotKey::Unit(5, UnitStage::EotfLut),
            BlobId::new(9),
        );
        assert!(table.get(SlotKey::Unit(5, UnitStage::EotfLut)).is_none());
        assert!(transport.destroyed.is_empty());
    }
}
