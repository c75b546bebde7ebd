use value::{
    Value,
    ValueType,
};

use crate::function::{
    resolve_value,
    AdditionalFields,
    FieldSource,
    FunctionCall,
    QueryFunction,
};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine great-circle distance, in kilometers, between a `(latitudeFrom,
/// longitudeFrom)` pair of numeric fields and a fixed `(latitudeToValue,
/// longitudeToValue)` coordinate, written to `as` (default `"distance"`).
pub struct DistanceFunction {
    pub latitude_from: String,
    pub longitude_from: String,
    pub latitude_to: f64,
    pub longitude_to: f64,
    pub as_name: String,
}

impl DistanceFunction {
    pub fn parse(call: &FunctionCall) -> anyhow::Result<Self> {
        Ok(Self {
            latitude_from: call.string_param("latitudeFrom")?,
            longitude_from: call.string_param("longitudeFrom")?,
            latitude_to: call.number_param("latitudeToValue")?,
            longitude_to: call.number_param("longitudeToValue")?,
            as_name: call.optional_string_param("as", "distance"),
        })
    }
}

impl QueryFunction for DistanceFunction {
    fn run(&self, source: &dyn FieldSource, object_ids: &[i64], additional_fields: &mut AdditionalFields) -> anyhow::Result<()> {
        for field_name in [&self.latitude_from, &self.longitude_from] {
            if source.field_type(field_name) != Some(ValueType::Number) {
                return Err(errors::field_has_unsupported_type_for_this_function(field_name));
            }
        }

        for &id in object_ids {
            let lat = match resolve_value(source, additional_fields, id, &self.latitude_from) {
                Some(Value::Number(n)) => n.value(),
                _ => None,
            };
            let lon = match resolve_value(source, additional_fields, id, &self.longitude_from) {
                Some(Value::Number(n)) => n.value(),
                _ => None,
            };
            let (Some(lat), Some(lon)) = (lat, lon) else {
                continue;
            };

            let distance = haversine(lat, lon, self.latitude_to, self.longitude_to);
            additional_fields
                .entry(id)
                .or_default()
                .insert(self.as_name.clone(), Value::Number(value::Number::new(distance)));
        }
        Ok(())
    }
}

fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1_rad, lat2_rad) = (lat1.to_radians(), lat2.to_radians());
    let dlat = lat2_rad - lat1_rad;
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}
