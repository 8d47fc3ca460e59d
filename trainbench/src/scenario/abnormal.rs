use super::{Journey, Stop};
use crate::client::{PaymentClient, SutClient};
use crate::error::{BenchError, ClientError};
use crate::transaction::{step, StepError};
use std::future::Future;
use trainbench_core::EndpointKind;

impl<C, P> Journey<C, P>
where
    C: SutClient + Send + Sync + 'static,
    P: PaymentClient + Send + Sync + 'static,
{
    /// Unknown credentials and anonymous sessions must both be turned away with 401.
    pub(crate) async fn abnormal_login(&self) -> Result<(), Stop> {
        let stranger = self.data.user();
        self.expect_unauthorized(
            EndpointKind::Login,
            self.client.login(&stranger),
            "login with unregistered credentials succeeded",
        )
        .await?;

        self.expect_unauthorized(
            EndpointKind::ListReservations,
            self.client.list_reservations(),
            "reservation list was served without a login",
        )
        .await
    }

    async fn expect_unauthorized<T, F>(
        &self,
        kind: EndpointKind,
        func: F,
        message: &str,
    ) -> Result<(), Stop>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        match step(kind, func).await {
            Ok(_) => Err(self
                .fail(kind, BenchError::application(format!("{kind}: {message}")))
                .await),
            Err(StepError::Client(err)) if err.status() == Some(401) => {
                self.succeed(kind).await;
                Ok(())
            }
            Err(StepError::Deadline) => Err(Stop::Deadline),
            Err(StepError::Client(err)) => {
                Err(self.fail(kind, BenchError::from_client(kind, err)).await)
            }
        }
    }
}
