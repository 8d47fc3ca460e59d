use crate::{step_labels, ReservationId, StepLabels};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Service endpoints the harness scores. Parameterized endpoints are tracked per kind, not
/// per reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Initialize,
    Register,
    Login,
    Logout,
    ListStations,
    SearchTrains,
    ListSeats,
    Reserve,
    CommitReservation,
    CancelReservation,
    ListReservations,
    ShowReservation,
}

impl EndpointKind {
    pub const ALL: [EndpointKind; 12] = [
        EndpointKind::Initialize,
        EndpointKind::Register,
        EndpointKind::Login,
        EndpointKind::Logout,
        EndpointKind::ListStations,
        EndpointKind::SearchTrains,
        EndpointKind::ListSeats,
        EndpointKind::Reserve,
        EndpointKind::CommitReservation,
        EndpointKind::CancelReservation,
        EndpointKind::ListReservations,
        EndpointKind::ShowReservation,
    ];

    pub fn method(&self) -> &'static str {
        use EndpointKind::*;
        match self {
            ListStations | SearchTrains | ListSeats | ListReservations | ShowReservation => "GET",
            _ => "POST",
        }
    }

    /// Route template; `{id}` stands for a reservation id.
    pub fn path(&self) -> &'static str {
        use EndpointKind::*;
        match self {
            Initialize => "/initialize",
            Register => "/api/user",
            Login => "/api/auth",
            Logout => "/api/auth/logout",
            ListStations => "/api/stations",
            SearchTrains => "/api/train/search",
            ListSeats => "/api/train/seats",
            Reserve => "/api/train/reserve",
            CommitReservation => "/api/train/reservation/commit",
            CancelReservation => "/api/user/reservations/{id}/cancel",
            ListReservations => "/api/user/reservations",
            ShowReservation => "/api/user/reservations/{id}",
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(
            self,
            EndpointKind::CancelReservation | EndpointKind::ShowReservation
        )
    }

    pub fn weight(&self) -> u64 {
        1
    }

    /// Concrete path for a request, substituting the reservation id into dynamic routes.
    pub fn format_path(&self, id: Option<ReservationId>) -> String {
        match id {
            Some(id) if self.is_dynamic() => self.path().replace("{id}", &id.to_string()),
            _ => self.path().to_string(),
        }
    }

    pub fn labels(&self) -> StepLabels {
        use EndpointKind::*;
        match self {
            Initialize => step_labels!(initialize),
            Register => step_labels!(register),
            Login => step_labels!(login),
            Logout => step_labels!(logout),
            ListStations => step_labels!(list_stations),
            SearchTrains => step_labels!(search_trains),
            ListSeats => step_labels!(list_seats),
            Reserve => step_labels!(reserve),
            CommitReservation => step_labels!(commit_reservation),
            CancelReservation => step_labels!(cancel_reservation),
            ListReservations => step_labels!(list_reservations),
            ShowReservation => step_labels!(show_reservation),
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_paths() {
        assert_eq!(
            EndpointKind::ShowReservation.format_path(Some(42)),
            "/api/user/reservations/42"
        );
        assert_eq!(
            EndpointKind::CancelReservation.format_path(Some(7)),
            "/api/user/reservations/7/cancel"
        );
        assert_eq!(
            EndpointKind::Reserve.format_path(Some(7)),
            "/api/train/reserve"
        );
        assert_eq!(
            EndpointKind::ALL.iter().filter(|k| k.is_dynamic()).count(),
            2
        );
    }

    #[test]
    fn labels() {
        let labels = EndpointKind::ListSeats.labels();
        assert_eq!(labels.success, "list_seats_success");
        assert_eq!(labels.error, "list_seats_error");
        assert_eq!(labels.latency, "list_seats_latency");
    }

    #[test]
    fn display() {
        assert_eq!(
            EndpointKind::Login.to_string(),
            "POST /api/auth"
        );
        assert_eq!(
            EndpointKind::Logout.to_string(),
            "POST /api/auth/logout"
        );
    }
}
