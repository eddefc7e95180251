use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

pub mod agents;
pub mod config;
pub mod controller;
pub mod engines;
pub mod errors;
pub mod events;
pub mod id;
pub mod logging;
pub mod messaging;
pub mod network;
pub mod population;
pub mod random;
pub mod replanning;
pub mod scenario;
#[allow(clippy::module_inception)]
pub mod simulation;
pub mod time_queue;
pub mod vehicles;

/// Free-form key/value attributes attached to plans, activities and legs. Values are stored
/// as JSON values so that collaborators can put arbitrary serializable payloads here without
/// this crate knowing their types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InternalAttributes {
    attrs: HashMap<String, serde_json::Value>,
}

impl InternalAttributes {
    pub fn add<T: Serialize>(&mut self, key: &str, value: T) {
        let value = serde_json::to_value(value).expect("Attribute value was not serializable");
        self.attrs.insert(String::from(key), value);
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attrs
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}
