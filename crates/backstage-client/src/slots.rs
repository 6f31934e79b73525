//! Per-slot document state machine:
//! Empty → Uploading → Present → Deleting → Empty.
//!
//! A failed upload returns to whatever the slot held before; a failed
//! delete returns to Present. `signed_contract` never enters Deleting.

use thiserror::Error;

use backstage_types::models::{DocumentRef, DocumentSet, DocumentSlot, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Uploading { prior: Option<DocumentRef> },
    Present(DocumentRef),
    Deleting(DocumentRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("The {0} is busy")]
    Busy(&'static str),
    #[error("No {0} has been uploaded")]
    Empty(&'static str),
    #[error("The {0} cannot be deleted")]
    NotDeletable(&'static str),
}

impl SlotState {
    pub fn from_document(document: Option<&DocumentRef>) -> Self {
        match document {
            Some(doc) => Self::Present(doc.clone()),
            None => Self::Empty,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Uploading { .. } | Self::Deleting(_))
    }

    pub fn document(&self) -> Option<&DocumentRef> {
        match self {
            Self::Present(doc) | Self::Deleting(doc) => Some(doc),
            Self::Uploading { prior } => prior.as_ref(),
            Self::Empty => None,
        }
    }
}

/// One slot and its state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotMachine {
    slot: DocumentSlot,
    state: SlotState,
}

impl SlotMachine {
    pub fn new(slot: DocumentSlot, document: Option<&DocumentRef>) -> Self {
        Self {
            slot,
            state: SlotState::from_document(document),
        }
    }

    pub fn slot(&self) -> DocumentSlot {
        self.slot
    }

    pub fn state(&self) -> &SlotState {
        &self.state
    }

    pub fn begin_upload(&mut self) -> Result<(), SlotError> {
        let prior = match &self.state {
            SlotState::Empty => None,
            SlotState::Present(doc) => Some(doc.clone()),
            _ => return Err(SlotError::Busy(self.slot.label())),
        };
        self.state = SlotState::Uploading { prior };
        Ok(())
    }

    pub fn upload_succeeded(&mut self, document: DocumentRef) {
        if matches!(self.state, SlotState::Uploading { .. }) {
            self.state = SlotState::Present(document);
        }
    }

    pub fn upload_failed(&mut self) {
        if let SlotState::Uploading { prior } = &self.state {
            self.state = SlotState::from_document(prior.as_ref());
        }
    }

    pub fn begin_delete(&mut self) -> Result<(), SlotError> {
        if !self.slot.is_deletable() {
            return Err(SlotError::NotDeletable(self.slot.label()));
        }
        match &self.state {
            SlotState::Present(doc) => {
                self.state = SlotState::Deleting(doc.clone());
                Ok(())
            }
            SlotState::Empty => Err(SlotError::Empty(self.slot.label())),
            _ => Err(SlotError::Busy(self.slot.label())),
        }
    }

    pub fn delete_succeeded(&mut self) {
        if matches!(self.state, SlotState::Deleting(_)) {
            self.state = SlotState::Empty;
        }
    }

    pub fn delete_failed(&mut self) {
        if let SlotState::Deleting(doc) = &self.state {
            self.state = SlotState::Present(doc.clone());
        }
    }
}

/// Which controls a viewer gets for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotControls {
    pub can_upload: bool,
    pub can_delete: bool,
    pub can_download: bool,
}

/// All six slots of one event, in fixed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotBoard {
    machines: Vec<SlotMachine>,
}

impl SlotBoard {
    pub fn new(documents: &DocumentSet) -> Self {
        Self {
            machines: DocumentSlot::ALL
                .iter()
                .map(|slot| SlotMachine::new(*slot, documents.get(*slot)))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotMachine> {
        self.machines.iter()
    }

    pub fn get(&self, slot: DocumentSlot) -> &SlotMachine {
        &self.machines[Self::index(slot)]
    }

    pub fn get_mut(&mut self, slot: DocumentSlot) -> &mut SlotMachine {
        &mut self.machines[Self::index(slot)]
    }

    fn index(slot: DocumentSlot) -> usize {
        DocumentSlot::ALL.iter().position(|s| *s == slot).unwrap_or(0)
    }

    /// Replace every idle slot with the server's view after an update.
    pub fn sync(&mut self, documents: &DocumentSet) {
        for machine in &mut self.machines {
            if !machine.state.is_busy() {
                machine.state = SlotState::from_document(documents.get(machine.slot));
            }
        }
    }

    pub fn controls(&self, slot: DocumentSlot, role: Role, is_owner: bool) -> SlotControls {
        let machine = self.get(slot);
        let writable = slot.can_write(role, is_owner) && !machine.state.is_busy();
        let present = matches!(machine.state, SlotState::Present(_));
        SlotControls {
            can_upload: writable,
            can_delete: writable && present && slot.is_deletable(),
            can_download: present,
        }
    }
}
