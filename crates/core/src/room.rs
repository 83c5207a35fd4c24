//! Room ownership rules and the class access gate.

use crate::class::StudentStatus;
use crate::error::CoreError;
use crate::types::DbId;

/// Who is asking, as far as room rules are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomActor {
    pub user_id: DbId,
    pub is_super_admin: bool,
}

/// Decide whether `actor` may enter a room.
///
/// Rooms without a class are open to everyone. A class-linked room admits
/// super-admins and students whose roster status in that class is exactly
/// `enrolled`. `roster_status` is the caller's status in the linked class,
/// or `None` when they are not on its roster.
pub fn check_room_access(
    room_class_id: Option<DbId>,
    actor: RoomActor,
    roster_status: Option<StudentStatus>,
) -> Result<(), CoreError> {
    if room_class_id.is_none() || actor.is_super_admin {
        return Ok(());
    }
    match roster_status {
        Some(StudentStatus::Enrolled) => Ok(()),
        _ => Err(CoreError::Forbidden(
            "Access denied: not a student in this class".into(),
        )),
    }
}

/// Only the creator may edit a room.
pub fn ensure_can_update(created_by: Option<DbId>, actor: RoomActor) -> Result<(), CoreError> {
    if created_by == Some(actor.user_id) {
        return Ok(());
    }
    Err(CoreError::Forbidden(
        "Only the room owner can update this room".into(),
    ))
}

/// The creator or a super-admin may delete a room.
pub fn ensure_can_delete(created_by: Option<DbId>, actor: RoomActor) -> Result<(), CoreError> {
    if actor.is_super_admin || created_by == Some(actor.user_id) {
        return Ok(());
    }
    Err(CoreError::Forbidden(
        "Only the room owner or a super admin can delete this room".into(),
    ))
}

/// A room's class may be set once and never changed afterwards.
pub fn ensure_class_assignable(current_class_id: Option<DbId>) -> Result<(), CoreError> {
    match current_class_id {
        None => Ok(()),
        Some(_) => Err(CoreError::Validation(
            "Room is already assigned to a class".into(),
        )),
    }
}
