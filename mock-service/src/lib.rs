//! Mock train reservation service and payment stub for local benchmarking.
use axum::{
    extract::{Path, Query, Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::HashMap;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use trainbench_core::{
    CardInformation, CardToken, CommitRequest, InitializeResponse, PaymentSettlement,
    ReservationId, ReservationRequest, ReservationSummary, ReserveResponse, SeatMap, SeatQuery,
    StationInfo, TrainSearchQuery, TrainSummary, User, MAX_RESERVATION_DAYS,
};

mod state;

pub use state::{PaymentState, ServiceError, ServiceState};

pub const SESSION_COOKIE: &str = "trainbench_session";

#[derive(Clone, Debug)]
pub struct ServiceOptions {
    pub available_days: u16,
    /// Requests beyond this rate are answered with 503.
    pub tps_limit: Option<NonZeroU32>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            available_days: MAX_RESERVATION_DAYS,
            tps_limit: None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    service: Arc<ServiceState>,
    sessions: Arc<RwLock<HashMap<String, String>>>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl AppState {
    pub fn new(service: Arc<ServiceState>, tps_limit: Option<NonZeroU32>) -> Self {
        Self {
            service,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            limiter: tps_limit.map(|tps| Arc::new(RateLimiter::direct(Quota::per_second(tps)))),
        }
    }

    fn open_session(&self, email: &str) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone(), email.to_string());
        token
    }

    /// Email of the logged in user behind the request's session cookie.
    fn session(&self, headers: &HeaderMap) -> Result<String, ServiceError> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        session_tokens(headers)
            .find_map(|token| sessions.get(token).cloned())
            .ok_or(ServiceError::Unauthorized)
    }

    fn close_session(&self, headers: &HeaderMap) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        for token in session_tokens(headers) {
            sessions.remove(token);
        }
    }
}

fn session_tokens(headers: &HeaderMap) -> impl Iterator<Item = &str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}

pub fn sut_router(state: AppState) -> Router {
    Router::new()
        .route("/initialize", post(initialize))
        .route("/api/user", post(register))
        .route("/api/auth", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/stations", get(stations))
        .route("/api/train/search", get(search_trains))
        .route("/api/train/seats", get(list_seats))
        .route("/api/train/reserve", post(reserve))
        .route("/api/train/reservation/commit", post(commit_reservation))
        .route("/api/user/reservations", get(list_reservations))
        .route("/api/user/reservations/:id", get(show_reservation))
        .route("/api/user/reservations/:id/cancel", post(cancel_reservation))
        .layer(middleware::from_fn_with_state(state.clone(), throttle))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn payment_router(payment: Arc<PaymentState>) -> Router {
    Router::new()
        .route("/initialize", post(payment_initialize))
        .route("/card", post(register_card))
        .route("/result", get(settlement))
        .layer(TraceLayer::new_for_http())
        .with_state(payment)
}

/// Addresses and state of mock services running in the background.
pub struct MockHandle {
    pub sut_addr: SocketAddr,
    pub payment_addr: SocketAddr,
    pub service: Arc<ServiceState>,
}

/// Binds both services on ephemeral local ports and serves them on background tasks.
pub async fn spawn(options: ServiceOptions) -> std::io::Result<MockHandle> {
    let sut = TcpListener::bind("127.0.0.1:0").await?;
    let payment = TcpListener::bind("127.0.0.1:0").await?;
    let handle = MockHandle {
        sut_addr: sut.local_addr()?,
        payment_addr: payment.local_addr()?,
        service: serve_in_background(sut, payment, options),
    };
    debug!(
        "Mock service on {}, payment stub on {}",
        handle.sut_addr, handle.payment_addr
    );
    Ok(handle)
}

fn serve_in_background(
    sut: TcpListener,
    payment: TcpListener,
    options: ServiceOptions,
) -> Arc<ServiceState> {
    let payment_state = Arc::new(PaymentState::new());
    let service = Arc::new(ServiceState::with_available_days(
        payment_state.clone(),
        options.available_days,
    ));
    let app = sut_router(AppState::new(service.clone(), options.tps_limit));

    tokio::spawn(async move {
        if let Err(err) = axum::serve(sut, app).await {
            tracing::error!("Mock service stopped: {err}");
        }
    });
    tokio::spawn(async move {
        if let Err(err) = axum::serve(payment, payment_router(payment_state)).await {
            tracing::error!("Payment stub stopped: {err}");
        }
    });

    service
}

/// Serves both services until either one fails.
pub async fn run(
    sut_addr: SocketAddr,
    payment_addr: SocketAddr,
    options: ServiceOptions,
) -> std::io::Result<()> {
    let payment = Arc::new(PaymentState::new());
    let service = Arc::new(ServiceState::with_available_days(
        payment.clone(),
        options.available_days,
    ));
    let app = sut_router(AppState::new(service, options.tps_limit));

    let sut = TcpListener::bind(&sut_addr).await?;
    let payment_listener = TcpListener::bind(&payment_addr).await?;
    info!("Mock service listening on {sut_addr}, payment stub on {payment_addr}");

    tokio::try_join!(
        axum::serve(sut, app).into_future(),
        axum::serve(payment_listener, payment_router(payment)).into_future(),
    )?;
    Ok(())
}

async fn throttle(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            return ServiceError::Unavailable.into_response();
        }
    }
    next.run(req).await
}

async fn initialize(State(state): State<AppState>) -> Json<InitializeResponse> {
    state
        .sessions
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
    Json(state.service.initialize())
}

async fn register(
    State(state): State<AppState>,
    Json(user): Json<User>,
) -> Result<StatusCode, ServiceError> {
    state.service.register(&user)?;
    Ok(StatusCode::OK)
}

async fn login(
    State(state): State<AppState>,
    Json(user): Json<User>,
) -> Result<impl IntoResponse, ServiceError> {
    state.service.login(&user)?;
    let token = state.open_session(&user.email);
    Ok((
        [(SET_COOKIE, format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly"))],
        StatusCode::OK,
    ))
}

/// Always succeeds; the session, if any, is dropped and its cookie expired.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    state.close_session(&headers);
    (
        [(SET_COOKIE, format!("{SESSION_COOKIE}=; Path=/; Max-Age=0"))],
        StatusCode::OK,
    )
}

async fn stations(State(state): State<AppState>) -> Json<Vec<StationInfo>> {
    Json(state.service.stations())
}

async fn search_trains(
    State(state): State<AppState>,
    Query(query): Query<TrainSearchQuery>,
) -> Result<Json<Vec<TrainSummary>>, ServiceError> {
    Ok(Json(state.service.search_trains(&query)?))
}

async fn list_seats(
    State(state): State<AppState>,
    Query(query): Query<SeatQuery>,
) -> Result<Json<SeatMap>, ServiceError> {
    Ok(Json(state.service.seat_map(&query)?))
}

async fn reserve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ReservationRequest>,
) -> Result<Json<ReserveResponse>, ServiceError> {
    let email = state.session(&headers)?;
    Ok(Json(state.service.reserve(&email, &request)?))
}

async fn commit_reservation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(commit): Json<CommitRequest>,
) -> Result<StatusCode, ServiceError> {
    let email = state.session(&headers)?;
    state
        .service
        .commit(&email, commit.reservation_id, &commit.card_token)?;
    Ok(StatusCode::OK)
}

async fn list_reservations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ReservationSummary>>, ServiceError> {
    let email = state.session(&headers)?;
    Ok(Json(state.service.reservations(&email)))
}

async fn show_reservation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<ReservationId>,
) -> Result<Json<ReservationSummary>, ServiceError> {
    let email = state.session(&headers)?;
    Ok(Json(state.service.reservation(&email, id)?))
}

async fn cancel_reservation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<ReservationId>,
) -> Result<StatusCode, ServiceError> {
    let email = state.session(&headers)?;
    state.service.cancel(&email, id)?;
    Ok(StatusCode::OK)
}

async fn payment_initialize(State(payment): State<Arc<PaymentState>>) -> StatusCode {
    payment.initialize();
    StatusCode::OK
}

async fn register_card(
    State(payment): State<Arc<PaymentState>>,
    Json(card): Json<CardInformation>,
) -> Result<Json<CardToken>, ServiceError> {
    let card_token = payment.register_card(card)?;
    Ok(Json(CardToken { card_token }))
}

async fn settlement(State(payment): State<Arc<PaymentState>>) -> Json<PaymentSettlement> {
    Json(payment.settlement())
}
