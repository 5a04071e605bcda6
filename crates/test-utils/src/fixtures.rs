//! Common component-tree fixtures for swe-common tests.
//!
//! Each fixture is a small but realistic schema exercising one part of the
//! data block engine: fixed mixed records, variable arrays, nested sizes
//! and choices.

use swe_common::{DataComponent, SweBuilder};

/// Weather station observation: a fixed-shape record mixing doubles, an
/// integer flag and text.
///
/// Atoms: `time`, `temperature`, `pressure`, `wind/speed`, `wind/direction`,
/// `quality`, `station`.
pub fn weather_record() -> DataComponent {
    SweBuilder::record("weather")
        .with_definition("http://sensorml.com/ont/swe/property/WeatherData")
        .field(SweBuilder::time_iso("time").with_label("Sampling Time"))
        .field(
            SweBuilder::quantity("temperature", "Cel")
                .with_definition("http://mmisw.org/ont/cf/parameter/air_temperature")
                .with_allowed_interval(-80.0, 60.0),
        )
        .field(SweBuilder::quantity("pressure", "hPa"))
        .field(
            SweBuilder::record("wind")
                .field(SweBuilder::quantity("speed", "m/s"))
                .field(SweBuilder::quantity("direction", "deg")),
        )
        .field(SweBuilder::count("quality"))
        .field(SweBuilder::text("station"))
        .build()
        .expect("weather fixture is valid")
}

/// Trajectory with a variable number of points sized by `num_points`.
///
/// Atoms: `time`, `num_points`, then `lat`, `lon`, `alt` per point.
pub fn trajectory() -> DataComponent {
    SweBuilder::record("trajectory")
        .field(SweBuilder::time_iso("time"))
        .field(SweBuilder::count("num_points").with_id("NUM_POINTS"))
        .field(SweBuilder::variable_array(
            "points",
            "#NUM_POINTS",
            SweBuilder::record("point")
                .field(SweBuilder::quantity("lat", "deg"))
                .field(SweBuilder::quantity("lon", "deg"))
                .field(SweBuilder::quantity("alt", "m")),
        ))
        .build()
        .expect("trajectory fixture is valid")
}

/// Two-dimensional grid: `height` rows of `width` values, both sizes
/// carried by Counts of the enclosing record.
pub fn nested_grid() -> DataComponent {
    SweBuilder::record("grid")
        .field(SweBuilder::count("width"))
        .field(SweBuilder::count("height"))
        .field(SweBuilder::variable_array(
            "rows",
            "height",
            SweBuilder::variable_array("row", "width", SweBuilder::quantity("value", "K")),
        ))
        .build()
        .expect("grid fixture is valid")
}

/// Message choice between a temperature, a wind record and a status text.
pub fn message_choice() -> DataComponent {
    SweBuilder::choice("message")
        .item(SweBuilder::quantity("temp", "Cel"))
        .item(
            SweBuilder::record("wind")
                .field(SweBuilder::quantity("speed", "m/s"))
                .field(SweBuilder::quantity("direction", "deg")),
        )
        .item(SweBuilder::text("status"))
        .build()
        .expect("message fixture is valid")
}

/// Record of a time, a quantity and a count.
pub fn simple_record() -> DataComponent {
    SweBuilder::record("rec")
        .field(SweBuilder::time("time", "s"))
        .field(SweBuilder::quantity("q", "m"))
        .field(SweBuilder::count("c"))
        .build()
        .expect("simple fixture is valid")
}

/// Record of a Count followed by an array of quantities it sizes.
pub fn counted_values() -> DataComponent {
    SweBuilder::record("series")
        .field(SweBuilder::count("n"))
        .field(SweBuilder::variable_array(
            "values",
            "n",
            SweBuilder::quantity("v", "m"),
        ))
        .build()
        .expect("series fixture is valid")
}

/// Sample text records for the encodings of [`weather_record`].
pub mod text {
    /// Two weather records, default separators.
    pub const WEATHER_CSV: &str = "2024-01-15T12:00:00Z,21.5,1013.2,3.4,270,1,KBOS\n\
                                   2024-01-15T12:10:00Z,21.7,1013.0,4.1,265,1,KBOS\n";

    /// A trajectory of two points.
    pub const TRAJECTORY_CSV: &str =
        "2024-01-15T12:00:00Z,2,42.36,-71.06,10.0,42.37,-71.05,12.5\n";
}

/// Common instants.
pub mod time {
    pub const REFERENCE_TIME: &str = "2024-01-15T12:00:00Z";

    /// `REFERENCE_TIME` in seconds since the Unix epoch.
    pub const REFERENCE_EPOCH: f64 = 1_705_320_000.0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use swe_common::DataHolder;

    #[test]
    fn test_fixtures_are_valid() {
        for root in [
            weather_record(),
            trajectory(),
            nested_grid(),
            message_choice(),
            simple_record(),
            counted_values(),
        ] {
            assert!(root.validate().is_ok(), "{} is invalid", root.name);
        }
    }

    #[test]
    fn test_fixture_atom_counts() {
        assert_eq!(DataHolder::new(weather_record()).unwrap().atom_count(), 7);
        assert_eq!(DataHolder::new(trajectory()).unwrap().atom_count(), 2);
        assert_eq!(DataHolder::new(nested_grid()).unwrap().atom_count(), 2);
        assert_eq!(DataHolder::new(message_choice()).unwrap().atom_count(), 1);
    }
}
