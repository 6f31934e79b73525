//! Pure change-to-notice rules for the two realtime feeds.

use uuid::Uuid;

use backstage_types::events::{EventChange, Notification};
use backstage_types::models::{DocumentSlot, Event};

/// The first production slot (in display order) that went from empty to
/// filled. The signed contract is the client's own upload and never counts.
pub fn first_new_client_document(old: &Event, new: &Event) -> Option<DocumentSlot> {
    DocumentSlot::ALL
        .into_iter()
        .filter(|slot| *slot != DocumentSlot::SignedContract)
        .find(|slot| !old.documents.is_present(*slot) && new.documents.is_present(*slot))
}

pub fn signed_contract_added(old: &Event, new: &Event) -> bool {
    !old.documents.is_present(DocumentSlot::SignedContract)
        && new.documents.is_present(DocumentSlot::SignedContract)
}

/// Notice for the owner's document feed, if this change warrants one.
pub fn client_notice(user_id: Uuid, change: &EventChange) -> Option<Notification> {
    if change.new.owner_id != user_id {
        return None;
    }
    let slot = first_new_client_document(&change.old, &change.new)?;
    Some(Notification::DocumentAvailable {
        event_id: change.new.id,
        event_name: change.new.display_name(),
        slot,
    })
}

pub fn contract_notice(change: &EventChange, actor: String) -> Notification {
    Notification::ContractSigned {
        event_id: change.new.id,
        event_name: change.new.display_name(),
        actor,
    }
}
