mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;

    use mock_service::ServiceOptions;
    use trainbench::prelude::*;
    use trainbench_core::fare::{self, SeatClass, TrainClass};
    use trainbench_core::{ReservationRequest, Seat, SeatQuery, TravelWindow, User};

    fn booking(train_name: &str, seats: Vec<Seat>) -> ReservationRequest {
        ReservationRequest {
            date: TravelWindow::default().day(9),
            origin: "Tokyo".into(),
            destination: "Osaka".into(),
            train_class: TrainClass::Fastest,
            train_name: train_name.into(),
            car_number: 5,
            seat_class: SeatClass::Reserved,
            seats,
            adults: 1,
            children: 0,
        }
    }

    #[tokio::test]
    async fn abnormal_login_is_refused() {
        init();
        let mock = Mock::spawn(ServiceOptions::default()).await.unwrap();
        let sut = mock.sut().unwrap();

        let err = sut
            .login(&User::new("ghost@example.com", "nope"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.severity(), Severity::Application);

        let err = sut.list_reservations().await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn double_booking_conflicts() {
        init();
        let mock = Mock::spawn(ServiceOptions::default()).await.unwrap();
        let alice = mock.sut().unwrap();
        let bob = mock.sut().unwrap();
        for (client, email) in [(&alice, "alice@example.com"), (&bob, "bob@example.com")] {
            let user = User::new(email, "secret");
            client.register(&user).await.unwrap();
            client.login(&user).await.unwrap();
        }

        let trains = alice
            .search_trains(&trainbench_core::TrainSearchQuery {
                date: TravelWindow::default().day(9),
                origin: "Tokyo".into(),
                destination: "Osaka".into(),
                train_class: Some(TrainClass::Fastest),
                adults: 1,
                children: 0,
            })
            .await
            .unwrap();
        let train = &trains[0].train_name;

        let request = booking(train, vec![Seat::new(1, "A")]);
        let reserved = alice.reserve(&request).await.unwrap();
        assert_eq!(reserved.amount, fare::amount(&request).unwrap());

        let err = bob.reserve(&request).await.unwrap_err();
        assert_eq!(err.status(), Some(409));

        let seats = bob
            .list_seats(&SeatQuery {
                date: request.date,
                train_class: request.train_class,
                train_name: train.clone(),
                car_number: request.car_number,
                origin: "Kyoto".into(),
                destination: "Osaka".into(),
            })
            .await
            .unwrap();
        let taken = seats
            .seats
            .iter()
            .find(|s| s.seat() == Seat::new(1, "A"))
            .unwrap();
        assert!(taken.is_occupied);
    }

    #[tokio::test]
    async fn commit_charges_and_cancel_refunds() {
        init();
        let mock = Mock::spawn(ServiceOptions::default()).await.unwrap();
        let sut = mock.sut().unwrap();
        let payment = mock.payment_client().unwrap();

        let user = User::new("carol@example.com", "secret");
        sut.register(&user).await.unwrap();
        sut.login(&user).await.unwrap();

        let request = booking("1", vec![Seat::new(2, "B"), Seat::new(2, "C")]);
        let reserved = sut.reserve(&request).await.unwrap();
        let token = payment
            .register_card(&trainbench_core::CardInformation {
                card_number: "4111111111111111".into(),
                cvv: "123".into(),
                expiry_date: "12/30".into(),
            })
            .await
            .unwrap();
        sut.commit_reservation(reserved.reservation_id, &token)
            .await
            .unwrap();

        let shown = sut.show_reservation(reserved.reservation_id).await.unwrap();
        assert_eq!(shown.amount, reserved.amount);
        assert_eq!(shown.seats.len(), 2);

        let settlement = payment.settlement().await.unwrap();
        assert_eq!(settlement.records.len(), 1);
        assert_eq!(settlement.records[0].amount, reserved.amount);
        assert!(!settlement.records[0].is_canceled);

        sut.cancel_reservation(reserved.reservation_id).await.unwrap();
        let err = sut
            .show_reservation(reserved.reservation_id)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(payment.settlement().await.unwrap().records[0].is_canceled);
    }

    #[tokio::test]
    async fn switching_users_keeps_bookings_private() {
        init();
        let mock = Mock::spawn(ServiceOptions::default()).await.unwrap();
        let sut = mock.sut().unwrap();

        let owner = User::new("erin@example.com", "secret");
        sut.register(&owner).await.unwrap();
        sut.login(&owner).await.unwrap();
        let reserved = sut
            .reserve(&booking("1", vec![Seat::new(3, "A")]))
            .await
            .unwrap();

        sut.logout().await.unwrap();
        let stranger = User::new("frank@example.com", "secret");
        sut.register(&stranger).await.unwrap();
        sut.login(&stranger).await.unwrap();

        let err = sut
            .cancel_reservation(reserved.reservation_id)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(sut.list_reservations().await.unwrap().is_empty());

        sut.logout().await.unwrap();
        sut.login(&owner).await.unwrap();
        let shown = sut.show_reservation(reserved.reservation_id).await.unwrap();
        assert_eq!(shown.reservation_id, reserved.reservation_id);
    }
}
