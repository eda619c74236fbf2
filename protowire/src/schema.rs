//! Message contracts.
//!
//! A [`Schema`] binds a Rust type to its field layout on the wire. Hand
//! rolled or generated, implementations stay generic over [`Output`] and
//! [`Input`] so the same schema drives encoding and decoding.

use crate::error::ReadError;
use crate::reader::Input;
use crate::writer::Output;

pub trait Schema<'a, T> {
    fn write_to<O: Output<'a>>(&self, output: &mut O, value: &'a T);

    /// Folds fields from `input` into `target` until the current region is
    /// exhausted. Unknown fields are skipped, so schema evolution only adds.
    fn merge_from<I: Input<'a>>(&self, input: &mut I, target: &mut T) -> Result<(), ReadError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Decoder;
    use crate::writer::Encoder;

    #[derive(Debug, Default, PartialEq)]
    struct Position {
        lat: f64,
        lon: f64,
    }

    #[derive(Debug, Default, PartialEq)]
    struct Telemetry {
        device: String,
        readings: Vec<f64>,
        flags: Vec<bool>,
        payload: Vec<u8>,
        position: Position,
        sequence: u64,
    }

    struct TelemetrySchema;

    impl<'a> Schema<'a, Telemetry> for TelemetrySchema {
        fn write_to<O: Output<'a>>(&self, output: &mut O, value: &'a Telemetry) {
            output.write_string(1, &value.device);
            output.write_list(2, value.readings.iter().copied(), |w, v| {
                w.write_double_packed(v)
            });
            output.write_bool_array(3, &value.flags);
            output.write_bytes(4, &value.payload);
            output.write_message(5, |w| {
                w.write_double(1, value.position.lat);
                w.write_double(2, value.position.lon);
            });
            output.write_u64(6, value.sequence);
        }

        fn merge_from<I: Input<'a>>(
            &self,
            input: &mut I,
            target: &mut Telemetry,
        ) -> Result<(), ReadError> {
            loop {
                match input.read_field_number()? {
                    0 => return Ok(()),
                    1 => target.device = input.read_string()?.to_owned(),
                    2 => target.readings = input.read_list(|i| i.read_double())?,
                    3 => target.flags = input.read_bool_array()?,
                    4 => target.payload = input.read_bytes()?.to_vec(),
                    5 => input.read_message(|i| {
                        loop {
                            match i.read_field_number()? {
                                0 => return Ok(()),
                                1 => target.position.lat = i.read_double()?,
                                2 => target.position.lon = i.read_double()?,
                                _ => i.handle_unknown_field()?,
                            }
                        }
                    })?,
                    6 => target.sequence = input.read_u64()?,
                    _ => input.handle_unknown_field()?,
                }
            }
        }
    }

    #[test]
    fn schema_round_trip() {
        let original = Telemetry {
            device: "probe-7".to_owned(),
            readings: vec![0.0, -1.5, 1000.25, f64::MIN_POSITIVE],
            flags: vec![true, true, false, true, false, false, true, false, true],
            payload: (0..2000).map(|i| i as u8).collect(),
            position: Position { lat: 52.52, lon: 13.405 },
            sequence: u64::MAX,
        };

        let mut encoder = Encoder::new();
        TelemetrySchema.write_to(&mut encoder, &original);
        let bytes = encoder.to_bytes();

        let mut decoder = Decoder::new(&bytes);
        let mut decoded = Telemetry::default();
        TelemetrySchema.merge_from(&mut decoder, &mut decoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        // a future revision wrote extra fields 9 and 10
        let mut encoder = Encoder::new();
        encoder.write_string(1, "probe-8");
        encoder.write_string(9, "firmware-小");
        encoder.write_fixed32(10, 0xFEED);
        encoder.write_u64(6, 17);
        let bytes = encoder.to_bytes();

        let mut decoder = Decoder::new(&bytes);
        let mut decoded = Telemetry::default();
        TelemetrySchema.merge_from(&mut decoder, &mut decoded).unwrap();
        assert_eq!("probe-8", decoded.device);
        assert_eq!(17, decoded.sequence);
    }
}
