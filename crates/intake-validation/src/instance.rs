//! Validated model instances

use crate::types::Value;

/// The coerced, validated output for a model
///
/// Holds one value per declared field (keyed by field name, not alias) in
/// declaration order, followed by any extra keys kept under the `allow` policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInstance {
    model: String,
    fields: Vec<(String, Value)>,
}

impl ModelInstance {
    pub fn new(model: impl Into<String>, fields: Vec<(String, Value)>) -> Self {
        Self {
            model: model.into(),
            fields,
        }
    }

    /// Name of the model this instance was validated against
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Raw form of this instance; validating it again yields an equal instance
    pub fn to_raw(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Deserialize into a typed struct
    ///
    /// Field names are used as keys, so `#[derive(Deserialize)]` structs
    /// mirroring the model line up without renames.
    #[cfg(feature = "serde")]
    pub fn deserialize_into<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::Value::from(self.to_raw()))
    }
}

impl From<ModelInstance> for Value {
    fn from(instance: ModelInstance) -> Self {
        instance.into_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> ModelInstance {
        ModelInstance::new(
            "Item",
            vec![
                ("name".to_string(), Value::from("Foo")),
                ("price".to_string(), Value::Float(35.4)),
                ("tax".to_string(), Value::Null),
                ("in_stock".to_string(), Value::Bool(true)),
                ("quantity".to_string(), Value::Int(3)),
            ],
        )
    }

    #[test]
    fn test_getters() {
        let item = item();
        assert_eq!(item.model(), "Item");
        assert_eq!(item.get_str("name"), Some("Foo"));
        assert_eq!(item.get_float("price"), Some(35.4));
        assert_eq!(item.get_float("quantity"), Some(3.0));
        assert_eq!(item.get_int("quantity"), Some(3));
        assert_eq!(item.get_bool("in_stock"), Some(true));
        assert_eq!(item.get("tax"), Some(&Value::Null));
        assert_eq!(item.get("missing"), None);
    }

    #[test]
    fn test_to_raw_keeps_order() {
        let raw = item().to_raw();
        match raw {
            Value::Object(pairs) => {
                let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, vec!["name", "price", "tax", "in_stock", "quantity"]);
            }
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_into() {
        #[derive(serde::Deserialize)]
        struct Item {
            name: String,
            price: f64,
            tax: Option<f64>,
            quantity: i64,
        }

        let typed: Item = item().deserialize_into().unwrap();
        assert_eq!(typed.name, "Foo");
        assert_eq!(typed.price, 35.4);
        assert_eq!(typed.tax, None);
        assert_eq!(typed.quantity, 3);
    }
}
