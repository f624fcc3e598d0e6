use geo::Geometry;
use geojson::JsonObject;
use serde_json::Value;

/// One geographic entity: geometry plus its open property bag.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    pub id: Option<Value>,
    /// `None` for topology objects of type `null`.
    pub geometry: Option<Geometry<f64>>,
    pub properties: JsonObject,
}

impl Feature {
    pub fn new(geometry: Option<Geometry<f64>>, properties: JsonObject) -> Self {
        Self { id: None, geometry, properties }
    }

    /// Numeric value of a property. Numeric strings count, anything else is absent.
    pub fn number(&self, key: &str) -> Option<f64> {
        let value = match self.properties.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        value.is_finite().then_some(value)
    }

    /// Display name from `key`, falling back to the feature id.
    pub fn name(&self, key: &str) -> String {
        match self.properties.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => match &self.id {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            },
            Some(other) => other.to_string(),
        }
    }
}

/// Features in decode order. Only the bar chart reorders them.
pub type FeatureSet = Vec<Feature>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> JsonObject {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn number_reads_numbers_and_numeric_strings() {
        let f = Feature::new(None, props(json!({"POP_EST": 1200, "GDP": " 3.5 ", "NAME": "x"})));
        assert_eq!(f.number("POP_EST"), Some(1200.0));
        assert_eq!(f.number("GDP"), Some(3.5));
        assert_eq!(f.number("NAME"), None);
        assert_eq!(f.number("missing"), None);
    }

    #[test]
    fn name_falls_back_to_id() {
        let mut f = Feature::new(None, JsonObject::new());
        assert_eq!(f.name("NAME"), "");
        f.id = Some(json!(276));
        assert_eq!(f.name("NAME"), "276");
        f.properties = props(json!({"NAME": "Germany"}));
        assert_eq!(f.name("NAME"), "Germany");
    }
}
