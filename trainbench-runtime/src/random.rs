use rand::seq::IteratorRandom;
use rand::Rng;
use trainbench::DataProvider;
use trainbench_core::fare::{SeatClass, TrainClass};
use trainbench_core::topology;
use trainbench_core::{CardInformation, User};

/// Random users and bookings.
///
/// Sections only use stations every train class stops at, so any search has candidates.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomData;

impl DataProvider for RandomData {
    fn user(&self) -> User {
        let id = uuid::Uuid::new_v4().simple();
        User::new(&format!("{id}@example.com"), &format!("pw-{id}"))
    }

    fn section(&self) -> (String, String) {
        let mut rng = rand::thread_rng();
        let mut stations = topology::express_stops().choose_multiple(&mut rng, 2);
        if rng.gen_bool(0.5) {
            stations.reverse();
        }
        match stations.as_slice() {
            [from, to] => (from.name.to_string(), to.name.to_string()),
            _ => ("Tokyo".to_string(), "Osaka".to_string()),
        }
    }

    fn train_class(&self) -> TrainClass {
        TrainClass::ALL[self.pick(TrainClass::ALL.len())]
    }

    fn seat_class(&self) -> SeatClass {
        SeatClass::ALL[self.pick(SeatClass::ALL.len())]
    }

    fn passengers(&self) -> (u32, u32) {
        let mut rng = rand::thread_rng();
        (rng.gen_range(1..=3), rng.gen_range(0..=2))
    }

    fn day_offset(&self, days: u16) -> u16 {
        rand::thread_rng().gen_range(0..days.max(1))
    }

    fn card(&self) -> CardInformation {
        let mut rng = rand::thread_rng();
        let digits = |n: usize, rng: &mut rand::rngs::ThreadRng| -> String {
            (0..n).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect()
        };
        CardInformation {
            card_number: digits(16, &mut rng),
            cvv: digits(3, &mut rng),
            expiry_date: format!("{:02}/{}", rng.gen_range(1..=12), rng.gen_range(25..=35)),
        }
    }

    fn pick(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len.max(1))
    }
}
