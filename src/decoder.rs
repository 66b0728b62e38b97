//! Datagram decoding.
//!
//! Pure: bytes in, typed records out. No I/O, no state besides the
//! compiled-in schema.

use prost::Message;
use serde::Serialize;

use crate::{
    error::DecodeError,
    proto::{MonitorPvt, Observables},
    record::{Arrival, ObservableSample, PvtFix},
};

/// Telemetry category, one per ingress port
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Observables,
    Pvt,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Observables, Category::Pvt];
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Observables => write!(f, "observables"),
            Self::Pvt => write!(f, "pvt"),
        }
    }
}

/// Decoded datagram, also the unit the broadcaster publishes.
/// Serializes as a tagged record: `{"type": "pvt", ..}`
/// or `{"type": "observables", "observables": [..]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Telemetry {
    Observables { observables: Vec<ObservableSample> },
    Pvt(PvtFix),
}

impl Telemetry {
    pub fn category(&self) -> Category {
        match self {
            Self::Observables { .. } => Category::Observables,
            Self::Pvt(_) => Category::Pvt,
        }
    }

    /// True when there is nothing to record nor publish
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Observables { observables } => observables.is_empty(),
            Self::Pvt(_) => false,
        }
    }
}

/// Decodes one datagram of given [Category].
///
/// Observables entries with a null sampling rate are inactive channels:
/// their content is garbage and they are dropped here.
pub fn decode(
    category: Category,
    bytes: &[u8],
    arrival: &Arrival,
) -> Result<Telemetry, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    match category {
        Category::Observables => {
            let epoch = Observables::decode(bytes)?;

            let observables = epoch
                .observable
                .into_iter()
                .filter(|synchro| synchro.fs != 0)
                .map(|synchro| ObservableSample::from_proto(synchro, arrival))
                .collect();

            Ok(Telemetry::Observables { observables })
        },
        Category::Pvt => {
            let pvt = MonitorPvt::decode(bytes)?;
            Ok(Telemetry::Pvt(PvtFix::from_proto(pvt, arrival)))
        },
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::proto::GnssSynchro;

    pub(crate) fn synchro(channel_id: i32, cn0_db_hz: f64, fs: i64) -> GnssSynchro {
        GnssSynchro {
            system: "G".to_string(),
            signal: "1C".to_string(),
            prn: (channel_id as u32 % 32) + 1,
            channel_id,
            fs,
            cn0_db_hz,
            carrier_doppler_hz: -1234.5,
            ..Default::default()
        }
    }

    pub(crate) fn observables_datagram(entries: Vec<GnssSynchro>) -> Vec<u8> {
        Observables {
            observable: entries,
        }
        .encode_to_vec()
    }

    pub(crate) fn pvt_datagram(valid_sats: u32, solution_status: u32) -> Vec<u8> {
        MonitorPvt {
            tow_at_current_symbol_ms: 345_600_000,
            week: 2345,
            latitude: 41.275,
            longitude: 1.987,
            height: 80.5,
            valid_sats,
            solution_status,
            solution_type: 1,
            pdop: 1.8,
            ..Default::default()
        }
        .encode_to_vec()
    }

    #[test]
    fn zero_rate_entries_are_dropped() {
        let bytes = observables_datagram(vec![
            synchro(1, 45.0, 4_000_000),
            synchro(2, 0.0, 0),
            synchro(3, 38.2, 4_000_000),
        ]);

        let decoded = decode(Category::Observables, &bytes, &Arrival::now()).unwrap();

        match decoded {
            Telemetry::Observables { observables } => {
                let channels = observables.iter().map(|s| s.channel_id).collect::<Vec<_>>();
                assert_eq!(channels, vec![1, 3]);
                assert_eq!(observables[0].sv.as_deref(), Some("G02"));
                assert_eq!(observables[0].doppler_hz, -1234.5);
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn only_inactive_channels() {
        let bytes = observables_datagram(vec![synchro(4, 10.0, 0)]);
        let decoded = decode(Category::Observables, &bytes, &Arrival::now()).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.category(), Category::Observables);
    }

    #[test]
    fn pvt_single_record() {
        let bytes = pvt_datagram(7, 4);
        let decoded = decode(Category::Pvt, &bytes, &Arrival::now()).unwrap();

        match decoded {
            Telemetry::Pvt(fix) => {
                assert_eq!(fix.valid_sats, 7);
                assert_eq!(fix.solution_status, 4);
                assert_eq!(fix.week, 2345);
                assert_eq!(fix.tow_ms, 345_600_000);
                assert_eq!(fix.lat, 41.275);
                assert!(fix.epoch.is_some());
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn pvt_trailing_fields() {
        let mut bytes = pvt_datagram(8, 4);
        // galhas_status (35, varint) = 1
        bytes.extend_from_slice(&[0x98, 0x02, 0x01]);
        // geohash (36, length delimited) = "sp3"
        bytes.extend_from_slice(&[0xa2, 0x02, 0x03, b's', b'p', b'3']);

        match decode(Category::Pvt, &bytes, &Arrival::now()).unwrap() {
            Telemetry::Pvt(fix) => {
                assert_eq!(fix.valid_sats, 8);
                assert_eq!(fix.galhas_status, 1);
                assert_eq!(fix.geohash, "sp3");
            },
            other => panic!("unexpected {:?}", other),
        }

        let bytes = MonitorPvt {
            valid_sats: 5,
            galhas_status: 2,
            geohash: "sp3e9".to_string(),
            ..Default::default()
        }
        .encode_to_vec();

        let json = serde_json::to_value(decode(Category::Pvt, &bytes, &Arrival::now()).unwrap())
            .unwrap();
        assert_eq!(json["galhas_status"], 2);
        assert_eq!(json["geohash"], "sp3e9");
    }

    #[test]
    fn malformed_datagrams() {
        let arrival = Arrival::now();

        assert!(matches!(
            decode(Category::Pvt, &[], &arrival),
            Err(DecodeError::Empty)
        ));

        let mut truncated = pvt_datagram(6, 4);
        truncated.truncate(truncated.len() - 3);
        assert!(matches!(
            decode(Category::Pvt, &truncated, &arrival),
            Err(DecodeError::Protobuf(_))
        ));

        // length delimited field claiming more bytes than available
        let garbage = [0x0a, 0x7f, 0x01];
        assert!(decode(Category::Observables, &garbage, &arrival).is_err());
    }

    #[test]
    fn tagged_serialization() {
        let bytes = pvt_datagram(6, 4);
        let decoded = decode(Category::Pvt, &bytes, &Arrival::now()).unwrap();

        let json = serde_json::to_value(&decoded).unwrap();
        assert_eq!(json["type"], "pvt");
        assert_eq!(json["valid_sats"], 6);
        assert!(json.get("received").is_none());

        let bytes = observables_datagram(vec![synchro(9, 41.0, 2_000_000)]);
        let decoded = decode(Category::Observables, &bytes, &Arrival::now()).unwrap();

        let json = serde_json::to_value(&decoded).unwrap();
        assert_eq!(json["type"], "observables");
        assert_eq!(json["observables"][0]["channel_id"], 9);
    }
}
