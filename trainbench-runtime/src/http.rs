//! HTTP clients for the service under test and the payment service.
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;
use trainbench::client::{PaymentClient, SutClient};
use trainbench::ClientError;
use trainbench_core::{
    CardInformation, CardToken, CommitRequest, EndpointKind, InitializeResponse,
    PaymentSettlement, ReservationId, ReservationRequest, ReservationSummary, ReserveResponse,
    SeatMap, SeatQuery, StationInfo, TrainSearchQuery, TrainSummary, User,
};
use url::Url;

use crate::error::RuntimeError;

/// Builds the connection pool shared by every session.
///
/// `timeout` bounds a request at the transport level. The harness applies its own per-call
/// timeout on top.
pub fn http_client(timeout: Duration) -> Result<Client, RuntimeError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("trainbench/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Client for one simulated user.
///
/// Connections are pooled across sessions but cookies are not: each client keeps its own jar,
/// so each journey logs in on its own.
pub struct HttpSutClient {
    client: Client,
    base: Url,
    jar: Arc<Jar>,
}

impl HttpSutClient {
    pub fn new(client: Client, base: Url) -> Self {
        Self {
            client,
            base,
            jar: Arc::new(Jar::default()),
        }
    }

    fn request(
        &self,
        kind: EndpointKind,
        id: Option<ReservationId>,
    ) -> Result<RequestBuilder, ClientError> {
        let url = join(&self.base, &kind.format_path(id))?;
        let method = if kind.method() == "GET" {
            Method::GET
        } else {
            Method::POST
        };
        trace!("{method} {url}");

        let cookies = self.jar.cookies(&url);
        let mut req = self.client.request(method, url);
        if let Some(cookies) = cookies {
            req = req.header(COOKIE, cookies);
        }
        Ok(req)
    }

    /// Sends the request and hands every `Set-Cookie` to the jar, which also drops expired
    /// cookies.
    async fn send(&self, req: RequestBuilder) -> Result<Response, ClientError> {
        let res = req.send().await.map_err(client_error)?;
        self.jar
            .set_cookies(&mut res.headers().get_all(SET_COOKIE).iter(), res.url());
        check_status(res).await
    }

    async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let res = self.send(req).await?;
        res.json().await.map_err(client_error)
    }

    async fn empty(&self, req: RequestBuilder) -> Result<(), ClientError> {
        self.send(req).await?;
        Ok(())
    }

    fn with_body<B: Serialize>(
        &self,
        kind: EndpointKind,
        body: &B,
    ) -> Result<RequestBuilder, ClientError> {
        Ok(self.request(kind, None)?.json(body))
    }
}

impl SutClient for HttpSutClient {
    async fn initialize(&self) -> Result<InitializeResponse, ClientError> {
        self.json(self.request(EndpointKind::Initialize, None)?).await
    }

    async fn register(&self, user: &User) -> Result<(), ClientError> {
        self.empty(self.with_body(EndpointKind::Register, user)?)
            .await
    }

    async fn login(&self, user: &User) -> Result<(), ClientError> {
        self.empty(self.with_body(EndpointKind::Login, user)?).await
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.empty(self.request(EndpointKind::Logout, None)?).await
    }

    async fn list_stations(&self) -> Result<Vec<StationInfo>, ClientError> {
        self.json(self.request(EndpointKind::ListStations, None)?)
            .await
    }

    async fn search_trains(
        &self,
        query: &TrainSearchQuery,
    ) -> Result<Vec<TrainSummary>, ClientError> {
        self.json(self.request(EndpointKind::SearchTrains, None)?.query(query))
            .await
    }

    async fn list_seats(&self, query: &SeatQuery) -> Result<SeatMap, ClientError> {
        self.json(self.request(EndpointKind::ListSeats, None)?.query(query))
            .await
    }

    async fn reserve(&self, request: &ReservationRequest) -> Result<ReserveResponse, ClientError> {
        self.json(self.with_body(EndpointKind::Reserve, request)?)
            .await
    }

    async fn commit_reservation(
        &self,
        id: ReservationId,
        card_token: &str,
    ) -> Result<(), ClientError> {
        let commit = CommitRequest {
            reservation_id: id,
            card_token: card_token.to_string(),
        };
        self.empty(self.with_body(EndpointKind::CommitReservation, &commit)?)
            .await
    }

    async fn cancel_reservation(&self, id: ReservationId) -> Result<(), ClientError> {
        self.empty(self.request(EndpointKind::CancelReservation, Some(id))?)
            .await
    }

    async fn list_reservations(&self) -> Result<Vec<ReservationSummary>, ClientError> {
        self.json(self.request(EndpointKind::ListReservations, None)?)
            .await
    }

    async fn show_reservation(
        &self,
        id: ReservationId,
    ) -> Result<ReservationSummary, ClientError> {
        self.json(self.request(EndpointKind::ShowReservation, Some(id))?)
            .await
    }
}

/// Client for the payment service. Stateless, so a single one is shared by every journey.
pub struct HttpPaymentClient {
    client: Client,
    base: Url,
}

impl HttpPaymentClient {
    pub fn new(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ClientError> {
        let res = req.send().await.map_err(client_error)?;
        check_status(res).await
    }
}

impl PaymentClient for HttpPaymentClient {
    async fn initialize(&self) -> Result<(), ClientError> {
        let url = join(&self.base, "/initialize")?;
        self.send(self.client.post(url)).await?;
        Ok(())
    }

    async fn register_card(&self, card: &CardInformation) -> Result<String, ClientError> {
        let url = join(&self.base, "/card")?;
        let res = self.send(self.client.post(url).json(card)).await?;
        let token: CardToken = res.json().await.map_err(client_error)?;
        Ok(token.card_token)
    }

    async fn settlement(&self) -> Result<PaymentSettlement, ClientError> {
        let url = join(&self.base, "/result")?;
        let res = self.send(self.client.get(url)).await?;
        res.json().await.map_err(client_error)
    }
}

fn join(base: &Url, path: &str) -> Result<Url, ClientError> {
    base.join(path)
        .map_err(|err| ClientError::Request(format!("{path}: {err}")))
}

async fn check_status(res: Response) -> Result<Response, ClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

fn client_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else if err.is_decode() {
        ClientError::Decode(err.to_string())
    } else if err.is_builder() {
        ClientError::Request(err.to_string())
    } else {
        ClientError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock_service::ServiceOptions;
    use time::macros::date;

    async fn connect() -> (mock_service::MockHandle, Client) {
        let handle = mock_service::spawn(ServiceOptions::default()).await.unwrap();
        (handle, http_client(Duration::from_secs(5)).unwrap())
    }

    fn base(addr: std::net::SocketAddr) -> Url {
        Url::parse(&format!("http://{addr}")).unwrap()
    }

    #[test]
    fn paths_join_onto_the_base() {
        let base = Url::parse("http://10.0.0.1:3000").unwrap();
        let url = join(
            &base,
            &EndpointKind::CancelReservation.format_path(Some(12)),
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "http://10.0.0.1:3000/api/user/reservations/12/cancel"
        );
    }

    #[tokio::test]
    async fn session_cookie_is_kept_per_client() {
        let (handle, client) = connect().await;
        let alice = HttpSutClient::new(client.clone(), base(handle.sut_addr));
        let bob = HttpSutClient::new(client, base(handle.sut_addr));

        let user = User::new("alice@example.com", "secret");
        alice.register(&user).await.unwrap();
        alice.login(&user).await.unwrap();

        assert!(alice.list_reservations().await.unwrap().is_empty());
        let err = bob.list_reservations().await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let (handle, client) = connect().await;
        let sut = HttpSutClient::new(client, base(handle.sut_addr));

        let user = User::new("carol@example.com", "secret");
        sut.register(&user).await.unwrap();
        sut.login(&user).await.unwrap();
        assert!(sut.list_reservations().await.is_ok());

        sut.logout().await.unwrap();
        let err = sut.list_reservations().await.unwrap_err();
        assert_eq!(err.status(), Some(401));

        sut.login(&user).await.unwrap();
        assert!(sut.list_reservations().await.is_ok());
    }

    /// Answers `/api/user/reservations` with 200 whenever any session cookie is presented,
    /// so only the client's own cookie handling decides the outcome.
    async fn cookie_echo() -> std::net::SocketAddr {
        use axum::http::header::{COOKIE, SET_COOKIE};
        use axum::http::{HeaderMap, StatusCode};
        use axum::routing::{get, post};
        use axum::Router;

        let app = Router::new()
            .route(
                "/api/auth",
                post(|| async {
                    (
                        [(SET_COOKIE, "session=abc; Path=/; HttpOnly")],
                        StatusCode::OK,
                    )
                }),
            )
            .route(
                "/api/auth/logout",
                post(|| async {
                    (
                        [(SET_COOKIE, "session=; Path=/; Max-Age=0")],
                        StatusCode::OK,
                    )
                }),
            )
            .route(
                "/api/user/reservations",
                get(|headers: HeaderMap| async move {
                    match headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
                        Some(cookie) if cookie.contains("session=abc") => {
                            (StatusCode::OK, "[]")
                        }
                        _ => (StatusCode::UNAUTHORIZED, "no session"),
                    }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        addr
    }

    #[tokio::test]
    async fn expired_cookie_is_not_sent_again() {
        let addr = cookie_echo().await;
        let client = http_client(Duration::from_secs(5)).unwrap();
        let sut = HttpSutClient::new(client.clone(), base(addr));
        let other = HttpSutClient::new(client, base(addr));

        assert_eq!(sut.list_reservations().await.unwrap_err().status(), Some(401));
        sut.login(&User::new("dave@example.com", "secret"))
            .await
            .unwrap();
        assert!(sut.list_reservations().await.unwrap().is_empty());
        assert_eq!(other.list_reservations().await.unwrap_err().status(), Some(401));

        sut.logout().await.unwrap();
        let err = sut.list_reservations().await.unwrap_err();
        assert!(
            matches!(err, ClientError::Status { status: 401, ref body } if body == "no session")
        );
    }

    #[tokio::test]
    async fn queries_and_bodies_reach_the_service() {
        let (handle, client) = connect().await;
        let sut = HttpSutClient::new(client.clone(), base(handle.sut_addr));
        let payment = HttpPaymentClient::new(client, base(handle.payment_addr));

        let init = SutClient::initialize(&sut).await.unwrap();
        assert_eq!(init.available_days, 159);
        PaymentClient::initialize(&payment).await.unwrap();
        assert_eq!(sut.list_stations().await.unwrap().len(), 82);

        let query = TrainSearchQuery {
            date: date!(2020 - 03 - 10),
            origin: "Tokyo".into(),
            destination: "Osaka".into(),
            train_class: None,
            adults: 1,
            children: 0,
        };
        let trains = sut.search_trains(&query).await.unwrap();
        assert!(!trains.is_empty());

        let card = CardInformation {
            card_number: "4111111111111111".into(),
            cvv: "123".into(),
            expiry_date: "11/30".into(),
        };
        let token = payment.register_card(&card).await.unwrap();
        assert!(!token.is_empty());
        assert!(payment.settlement().await.unwrap().records.is_empty());
    }

    #[tokio::test]
    async fn error_statuses_carry_the_body() {
        let (handle, client) = connect().await;
        let sut = HttpSutClient::new(client, base(handle.sut_addr));

        let user = User::new("nobody@example.com", "secret");
        let err = sut.login(&user).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let client = http_client(Duration::from_secs(1)).unwrap();
        let sut = HttpSutClient::new(client, Url::parse("http://127.0.0.1:1").unwrap());
        let err = sut.list_stations().await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}
