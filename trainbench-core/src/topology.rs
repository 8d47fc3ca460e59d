//! Static station topology of the line.
//!
//! Stations are ordered from Tokyo (position 1) to Osaka (position 82). Positions drive the
//! direction and overlap checks, distances drive the fare tiers.
use crate::fare::TrainClass;
use crate::CoreError;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which train classes stop at a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopPattern {
    pub express: bool,
    pub semi_express: bool,
    pub local: bool,
}

impl StopPattern {
    pub fn serves(&self, class: TrainClass) -> bool {
        match class {
            TrainClass::Fastest => self.express,
            TrainClass::Mid => self.semi_express,
            TrainClass::Slow => self.local,
        }
    }

    pub const EXPRESS: Self = Self {
        express: true,
        semi_express: true,
        local: true,
    };
    pub const SEMI_EXPRESS: Self = Self {
        express: false,
        semi_express: true,
        local: true,
    };
    pub const LOCAL: Self = Self {
        express: false,
        semi_express: false,
        local: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Station {
    pub name: &'static str,
    pub position: u32,
    pub distance: f64,
    pub stops: StopPattern,
}

const fn station(name: &'static str, position: u32, distance: f64, stops: StopPattern) -> Station {
    Station {
        name,
        position,
        distance,
        stops,
    }
}

pub static STATIONS: [Station; 82] = [
    station("Tokyo", 1, 0.000000, StopPattern::EXPRESS),
    station("Furuoka", 2, 12.745608, StopPattern::SEMI_EXPRESS),
    station("Ekanmachi", 3, 32.107649, StopPattern::LOCAL),
    station("SaashiKoen", 4, 45.037138, StopPattern::LOCAL),
    station("Katagao", 5, 52.773422, StopPattern::SEMI_EXPRESS),
    station("Yugo", 6, 60.930427, StopPattern::EXPRESS),
    station("Tsuzumiyama", 7, 72.915666, StopPattern::LOCAL),
    station("Hatsuno", 8, 80.517696, StopPattern::SEMI_EXPRESS),
    station("KabaiGakuen", 9, 96.053004, StopPattern::SEMI_EXPRESS),
    station("ShiozameKoen", 10, 112.665386, StopPattern::SEMI_EXPRESS),
    station("Yamada", 11, 119.444708, StopPattern::LOCAL),
    station("Omoteoka", 12, 131.462232, StopPattern::LOCAL),
    station("Namitori", 13, 149.826976, StopPattern::LOCAL),
    station("Hosono", 14, 166.909255, StopPattern::LOCAL),
    station("Sumisato", 15, 182.323457, StopPattern::LOCAL),
    station("Kanei", 16, 188.887999, StopPattern::LOCAL),
    station("Kigawa", 17, 207.599747, StopPattern::SEMI_EXPRESS),
    station("Kiritobi", 18, 217.900353, StopPattern::LOCAL),
    station("Kashimagarimachi", 19, 229.697609, StopPattern::LOCAL),
    station("Isakayama", 20, 244.770170, StopPattern::LOCAL),
    station("Horikirimachi", 21, 251.948590, StopPattern::LOCAL),
    station("Hachi", 22, 269.009280, StopPattern::LOCAL),
    station("Okuyama", 23, 275.384825, StopPattern::LOCAL),
    station("Koiakidera", 24, 284.952294, StopPattern::LOCAL),
    station("Gode", 25, 291.499545, StopPattern::LOCAL),
    station("AnzutakaKoen", 26, 310.086023, StopPattern::LOCAL),
    station("Arakawa", 27, 325.553902, StopPattern::EXPRESS),
    station("Isogawa", 28, 334.561908, StopPattern::LOCAL),
    station("Chagawa", 29, 343.842013, StopPattern::SEMI_EXPRESS),
    station("HachimiGakuen", 30, 355.192588, StopPattern::SEMI_EXPRESS),
    station("Azusagane", 31, 374.584703, StopPattern::SEMI_EXPRESS),
    station("Koida", 32, 381.847874, StopPattern::SEMI_EXPRESS),
    station("Naruto", 33, 393.244289, StopPattern::LOCAL),
    station("Magaritokumachi", 34, 411.802367, StopPattern::LOCAL),
    station("Irosakiyama", 35, 420.375925, StopPattern::LOCAL),
    station("Nenaga", 36, 428.829478, StopPattern::SEMI_EXPRESS),
    station("Shikachikagawa", 37, 445.676144, StopPattern::LOCAL),
    station("Yuihiro", 38, 457.246917, StopPattern::SEMI_EXPRESS),
    station("AnkaneKoen", 39, 474.044387, StopPattern::SEMI_EXPRESS),
    station("Chikaoka", 40, 487.270404, StopPattern::LOCAL),
    station("Ika", 41, 504.163580, StopPattern::LOCAL),
    station("Nagoya", 42, 519.612391, StopPattern::EXPRESS),
    station("KintaGakuen", 43, 531.408202, StopPattern::LOCAL),
    station("Wakindai", 44, 548.584849, StopPattern::LOCAL),
    station("Inafuyudai", 45, 554.215596, StopPattern::LOCAL),
    station("Matsuminatoyama", 46, 572.885503, StopPattern::LOCAL),
    station("Amazakura", 47, 584.344724, StopPattern::LOCAL),
    station("NesaKaigan", 48, 603.713433, StopPattern::LOCAL),
    station("Shimaidera", 49, 614.711098, StopPattern::LOCAL),
    station("Tsukiakeno", 50, 633.406177, StopPattern::LOCAL),
    station("Imokuregawa", 51, 640.097895, StopPattern::SEMI_EXPRESS),
    station("Kinami", 52, 657.573946, StopPattern::LOCAL),
    station("Hatohiragaoka", 53, 677.211495, StopPattern::LOCAL),
    station("IogiGakuen", 54, 689.581633, StopPattern::LOCAL),
    station("Hoike", 55, 696.405431, StopPattern::SEMI_EXPRESS),
    station("Kuno", 56, 711.087956, StopPattern::SEMI_EXPRESS),
    station("Sakurada", 57, 728.268005, StopPattern::LOCAL),
    station("Kasumisono", 58, 735.983348, StopPattern::SEMI_EXPRESS),
    station("Ebisudera", 59, 744.581560, StopPattern::LOCAL),
    station("Amano", 60, 751.340202, StopPattern::LOCAL),
    station("Toyama", 61, 770.125141, StopPattern::SEMI_EXPRESS),
    station("Ginsho", 62, 788.163214, StopPattern::LOCAL),
    station("Suekuni", 63, 799.939778, StopPattern::LOCAL),
    station("Izumiwakegawa", 64, 807.476895, StopPattern::SEMI_EXPRESS),
    station("Kyoto", 65, 819.772794, StopPattern::EXPRESS),
    station("SakuraUchi", 66, 833.349255, StopPattern::SEMI_EXPRESS),
    station("Ogikuzugaoka", 67, 839.298450, StopPattern::SEMI_EXPRESS),
    station("Amasumi", 68, 853.080719, StopPattern::SEMI_EXPRESS),
    station("Katsuraayadera", 69, 863.842723, StopPattern::SEMI_EXPRESS),
    station("Uji", 70, 869.266132, StopPattern::EXPRESS),
    station("TsukadeKaigan", 71, 878.247393, StopPattern::SEMI_EXPRESS),
    station("KakidoriKaigan", 72, 893.724394, StopPattern::LOCAL),
    station("Amainegaoka", 73, 900.098745, StopPattern::SEMI_EXPRESS),
    station("Morihategawa", 74, 909.518544, StopPattern::EXPRESS),
    station("FunaDa", 75, 919.249073, StopPattern::LOCAL),
    station("Katari", 76, 938.540025, StopPattern::LOCAL),
    station("Gomandai", 77, 954.151248, StopPattern::LOCAL),
    station("Hayamorino", 78, 966.498192, StopPattern::LOCAL),
    station("Kirihino", 79, 975.568259, StopPattern::SEMI_EXPRESS),
    station("Jogawa", 80, 990.339004, StopPattern::EXPRESS),
    station("Kikuoka", 81, 1005.597665, StopPattern::SEMI_EXPRESS),
    station("Osaka", 82, 1024.983484, StopPattern::EXPRESS),
];

lazy_static! {
    static ref STATION_INDEX: HashMap<&'static str, &'static Station> =
        STATIONS.iter().map(|s| (s.name, s)).collect();
}

pub fn stations() -> &'static [Station] {
    &STATIONS
}

pub fn lookup(name: &str) -> Result<&'static Station, CoreError> {
    STATION_INDEX
        .get(name)
        .copied()
        .ok_or_else(|| CoreError::UnknownStation(name.to_string()))
}

pub fn is_known(name: &str) -> bool {
    STATION_INDEX.contains_key(name)
}

pub fn position(name: &str) -> Result<u32, CoreError> {
    Ok(lookup(name)?.position)
}

/// Stations where every train class stops.
pub fn express_stops() -> impl Iterator<Item = &'static Station> {
    STATIONS.iter().filter(|s| s.stops.express)
}

/// True if `a` comes strictly before `b` when travelling from Tokyo towards Osaka.
pub fn is_before(a: &str, b: &str) -> Result<bool, CoreError> {
    Ok(position(a)? < position(b)?)
}

/// Absolute distance between two stations.
pub fn distance_between(from: &str, to: &str) -> Result<f64, CoreError> {
    Ok((lookup(to)?.distance - lookup(from)?.distance).abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_are_contiguous() {
        for (idx, station) in stations().iter().enumerate() {
            assert_eq!(station.position as usize, idx + 1);
        }
        assert_eq!(position("Tokyo").unwrap(), 1);
        assert_eq!(position("Osaka").unwrap(), 82);
    }

    #[test]
    fn distances_increase_along_the_line() {
        assert!(stations()
            .windows(2)
            .all(|pair| pair[0].distance < pair[1].distance));
    }

    #[test]
    fn unknown_station() {
        assert_eq!(
            lookup("Atlantis"),
            Err(CoreError::UnknownStation("Atlantis".to_string()))
        );
        assert!(!is_known("Atlantis"));
        assert!(is_before("Tokyo", "Atlantis").is_err());
    }

    #[test]
    fn ordering_and_distance() {
        assert!(is_before("Tokyo", "Nagoya").unwrap());
        assert!(!is_before("Osaka", "Kyoto").unwrap());
        assert!(!is_before("Kyoto", "Kyoto").unwrap());

        let d = distance_between("Osaka", "Tokyo").unwrap();
        assert!((d - 1024.983484).abs() < 1e-9);
        assert_eq!(
            distance_between("Nagoya", "Kyoto").unwrap(),
            distance_between("Kyoto", "Nagoya").unwrap()
        );
    }

    #[test]
    fn express_stops() {
        let express: Vec<_> = stations()
            .iter()
            .filter(|s| s.stops.express)
            .map(|s| s.name)
            .collect();
        assert_eq!(
            express,
            vec![
                "Tokyo",
                "Yugo",
                "Arakawa",
                "Nagoya",
                "Kyoto",
                "Uji",
                "Morihategawa",
                "Jogawa",
                "Osaka"
            ]
        );
        assert!(stations().iter().all(|s| s.stops.local));
        assert_eq!(super::express_stops().count(), express.len());
        assert!(super::express_stops().all(|s| TrainClass::ALL.iter().all(|c| s.stops.serves(*c))));
    }

    #[test]
    fn stop_patterns_by_class() {
        let kigawa = lookup("Kigawa").unwrap();
        assert!(!kigawa.stops.serves(TrainClass::Fastest));
        assert!(kigawa.stops.serves(TrainClass::Mid));
        assert!(kigawa.stops.serves(TrainClass::Slow));
    }
}
