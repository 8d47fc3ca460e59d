//! Boundaries to the collaborators the harness drives but does not implement.
use crate::error::{ClientError, Severity};
use trainbench_core::{
    fare::{SeatClass, TrainClass},
    CardInformation, InitializeResponse, PaymentSettlement, ReservationId, ReservationRequest,
    ReservationSummary, ReserveResponse, SeatMap, SeatQuery, StationInfo, TrainSearchQuery,
    TrainSummary, User,
};

/// Session-scoped client for the service under test. One instance per simulated user.
#[trait_variant::make(SutClient: Send)]
pub trait LocalSutClient {
    async fn initialize(&self) -> Result<InitializeResponse, ClientError>;

    async fn register(&self, user: &User) -> Result<(), ClientError>;

    async fn login(&self, user: &User) -> Result<(), ClientError>;

    /// Ends the session; later calls are anonymous until the next login.
    async fn logout(&self) -> Result<(), ClientError>;

    async fn list_stations(&self) -> Result<Vec<StationInfo>, ClientError>;

    async fn search_trains(
        &self,
        query: &TrainSearchQuery,
    ) -> Result<Vec<TrainSummary>, ClientError>;

    async fn list_seats(&self, query: &SeatQuery) -> Result<SeatMap, ClientError>;

    async fn reserve(&self, request: &ReservationRequest) -> Result<ReserveResponse, ClientError>;

    async fn commit_reservation(
        &self,
        id: ReservationId,
        card_token: &str,
    ) -> Result<(), ClientError>;

    async fn cancel_reservation(&self, id: ReservationId) -> Result<(), ClientError>;

    async fn list_reservations(&self) -> Result<Vec<ReservationSummary>, ClientError>;

    async fn show_reservation(&self, id: ReservationId)
        -> Result<ReservationSummary, ClientError>;
}

#[trait_variant::make(PaymentClient: Send)]
pub trait LocalPaymentClient {
    async fn initialize(&self) -> Result<(), ClientError>;

    /// Registers a card and returns its token.
    async fn register_card(&self, card: &CardInformation) -> Result<String, ClientError>;

    async fn settlement(&self) -> Result<PaymentSettlement, ClientError>;
}

/// Source of synthetic users, stations and booking parameters.
pub trait DataProvider: Send + Sync {
    fn user(&self) -> User;

    /// Two distinct station names.
    fn section(&self) -> (String, String);

    fn train_class(&self) -> TrainClass;

    fn seat_class(&self) -> SeatClass;

    /// `(adults, children)`, at least one passenger.
    fn passengers(&self) -> (u32, u32);

    /// Offset into a travel window of `days` days.
    fn day_offset(&self, days: u16) -> u16;

    fn card(&self) -> CardInformation;

    /// Index in `0..len`. `len` is never zero.
    fn pick(&self, len: usize) -> usize;
}

/// Sink for critical messages, such as a chat-ops webhook.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}
