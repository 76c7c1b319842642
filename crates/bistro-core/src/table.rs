//! # Table State Machine
//!
//! Pure transition rules for dining-table occupancy. The storage layer reads
//! the table inside its writer transaction, asks [`transition`] what to do,
//! and persists the returned [`TableUpdate`].
//!
//! ## Transition Table
//! ```text
//! ┌──────────────┬────────┬──────────┬──────────┬─────────────┐
//! │ from \ cmd   │ occupy │ reserve  │ free     │ maintenance │
//! ├──────────────┼────────┼──────────┼──────────┼─────────────┤
//! │ Free         │   ✓    │    ✓     │ no-op    │     ✓       │
//! │ Occupied     │   ✗    │    ✗     │   ✓      │     ✓       │
//! │ Reserved     │   ✓    │    ✗     │   ✓      │     ✓       │
//! │ Maintenance  │   ✗    │    ✗     │   ✓      │     ✓       │
//! └──────────────┴────────┴──────────┴──────────┴─────────────┘
//! ✗ = InvalidTransition
//! ```
//!
//! The table machine never touches orders. The order machine drives
//! `occupy`/`free` as part of its own transactions, never the reverse.

use crate::error::{CoreError, CoreResult};
use crate::types::{DiningTable, TableState};

/// A requested table transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableCommand {
    Occupy,
    Reserve { reservation_ref: String },
    Free,
    SetMaintenance { reason: Option<String> },
}

impl TableCommand {
    /// The state this command aims for (for error reporting).
    pub fn target(&self) -> TableState {
        match self {
            TableCommand::Occupy => TableState::Occupied,
            TableCommand::Reserve { .. } => TableState::Reserved,
            TableCommand::Free => TableState::Free,
            TableCommand::SetMaintenance { .. } => TableState::Maintenance,
        }
    }
}

/// The fields to persist after a legal transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableUpdate {
    pub state: TableState,
    pub reservation_ref: Option<String>,
    pub maintenance_reason: Option<String>,
    /// Reservation that was held when a `Reserved` table got occupied.
    pub released_reservation: Option<String>,
}

/// Decides the outcome of `command` on `table`.
///
/// ## Returns
/// * `Ok(Some(update))` - legal transition, persist `update`
/// * `Ok(None)` - legal no-op (`free` on a Free table); nothing may change,
///   including `last_cleaned_at`
/// * `Err(InvalidTransition)` - illegal for the current state
/// * `Err(InvalidState)` - occupy/reserve on a soft-disabled table
///
/// ## Example
/// ```rust,ignore
/// let update = transition(&table, &TableCommand::Occupy)?;
/// ```
pub fn transition(table: &DiningTable, command: &TableCommand) -> CoreResult<Option<TableUpdate>> {
    let illegal = || CoreError::invalid_transition("Table", table.id, table.state, command.target());

    match command {
        TableCommand::Occupy => {
            if !table.is_active {
                return Err(CoreError::invalid_state("Table", table.id, "disabled", "occupy"));
            }
            match table.state {
                TableState::Free | TableState::Reserved => Ok(Some(TableUpdate {
                    state: TableState::Occupied,
                    reservation_ref: None,
                    maintenance_reason: None,
                    released_reservation: table.reservation_ref.clone(),
                })),
                TableState::Occupied | TableState::Maintenance => Err(illegal()),
            }
        }
        TableCommand::Reserve { reservation_ref } => {
            if !table.is_active {
                return Err(CoreError::invalid_state("Table", table.id, "disabled", "reserve"));
            }
            match table.state {
                TableState::Free => Ok(Some(TableUpdate {
                    state: TableState::Reserved,
                    reservation_ref: Some(reservation_ref.clone()),
                    maintenance_reason: None,
                    released_reservation: None,
                })),
                _ => Err(illegal()),
            }
        }
        TableCommand::Free => match table.state {
            TableState::Free => Ok(None),
            _ => Ok(Some(TableUpdate {
                state: TableState::Free,
                reservation_ref: None,
                maintenance_reason: None,
                released_reservation: None,
            })),
        },
        TableCommand::SetMaintenance { reason } => Ok(Some(TableUpdate {
            state: TableState::Maintenance,
            reservation_ref: None,
            maintenance_reason: reason.clone(),
            released_reservation: None,
        })),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn table(state: TableState) -> DiningTable {
        DiningTable {
            id: 1,
            number: 12,
            capacity: 4,
            location: "Terrace".to_string(),
            state,
            reservation_ref: None,
            maintenance_reason: None,
            last_cleaned_at: None,
            state_changed_at: Utc::now(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_occupy_from_free_and_reserved() {
        let update = transition(&table(TableState::Free), &TableCommand::Occupy)
            .unwrap()
            .unwrap();
        assert_eq!(update.state, TableState::Occupied);

        let mut reserved = table(TableState::Reserved);
        reserved.reservation_ref = Some("R-88".to_string());
        let update = transition(&reserved, &TableCommand::Occupy).unwrap().unwrap();
        assert_eq!(update.state, TableState::Occupied);
        assert_eq!(update.reservation_ref, None);
        assert_eq!(update.released_reservation.as_deref(), Some("R-88"));
    }

    #[test]
    fn test_occupy_occupied_is_invalid_transition() {
        let err = transition(&table(TableState::Occupied), &TableCommand::Occupy).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidTransition {
                entity: "Table",
                id: 1,
                from: "occupied".to_string(),
                to: "occupied".to_string(),
            }
        );
        assert!(transition(&table(TableState::Maintenance), &TableCommand::Occupy).is_err());
    }

    #[test]
    fn test_reserve_only_from_free() {
        let cmd = TableCommand::Reserve {
            reservation_ref: "R-1".to_string(),
        };
        let update = transition(&table(TableState::Free), &cmd).unwrap().unwrap();
        assert_eq!(update.state, TableState::Reserved);
        assert_eq!(update.reservation_ref.as_deref(), Some("R-1"));

        for state in [TableState::Occupied, TableState::Reserved, TableState::Maintenance] {
            assert!(matches!(
                transition(&table(state), &cmd),
                Err(CoreError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_free_is_idempotent() {
        assert_eq!(transition(&table(TableState::Free), &TableCommand::Free).unwrap(), None);
        for state in [TableState::Occupied, TableState::Reserved, TableState::Maintenance] {
            let update = transition(&table(state), &TableCommand::Free).unwrap().unwrap();
            assert_eq!(update.state, TableState::Free);
        }
    }

    #[test]
    fn test_maintenance_from_any_state() {
        let cmd = TableCommand::SetMaintenance {
            reason: Some("wobbly leg".to_string()),
        };
        for state in [
            TableState::Free,
            TableState::Occupied,
            TableState::Reserved,
            TableState::Maintenance,
        ] {
            let update = transition(&table(state), &cmd).unwrap().unwrap();
            assert_eq!(update.state, TableState::Maintenance);
            assert_eq!(update.maintenance_reason.as_deref(), Some("wobbly leg"));
        }
    }

    #[test]
    fn test_disabled_table_cannot_be_seated() {
        let mut disabled = table(TableState::Free);
        disabled.is_active = false;
        assert!(matches!(
            transition(&disabled, &TableCommand::Occupy),
            Err(CoreError::InvalidState { .. })
        ));
        // Freeing is still allowed
        assert_eq!(transition(&disabled, &TableCommand::Free).unwrap(), None);
    }
}
