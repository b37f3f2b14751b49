//! Scripted stand-ins for the external collaborators, used by unit tests

use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::GatewayError;
use crate::gateway::{ControlApi, Method};

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: Method,
    pub action: String,
    pub params: Option<Value>,
}

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    queued: HashMap<String, VecDeque<Result<Value, GatewayError>>>,
}

/// Records every request. Queued responses are used once, in order; without
/// one, `guiCurrentCard` answers with a basic three-button card and every
/// other action with `true`.
#[derive(Clone, Default)]
pub struct ScriptedApi {
    script: Arc<Mutex<Script>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, action: &str, result: Value) {
        self.queue(action, Ok(result));
    }

    pub fn fail(&self, action: &str, err: GatewayError) {
        self.queue(action, Err(err));
    }

    fn queue(&self, action: &str, outcome: Result<Value, GatewayError>) {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(action.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.action).collect()
    }
}

impl ControlApi for ScriptedApi {
    fn send(
        &self,
        method: Method,
        action: &str,
        params: Option<Value>,
        _label: &str,
    ) -> Result<Value, GatewayError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call {
            method,
            action: action.to_string(),
            params,
        });
        if let Some(outcome) = script.queued.get_mut(action).and_then(|q| q.pop_front()) {
            return outcome;
        }
        Ok(match action {
            "guiCurrentCard" => card_result("Front", 0, "Back", 1, &[1, 2, 3]),
            _ => Value::Bool(true),
        })
    }
}

/// `guiCurrentCard` result with two fields; values are "<name> value"
pub fn card_result(first: &str, first_order: u32, second: &str, second_order: u32, buttons: &[u8]) -> Value {
    let mut fields = serde_json::Map::new();
    fields.insert(
        first.to_string(),
        json!({ "value": format!("{} value", first), "order": first_order }),
    );
    fields.insert(
        second.to_string(),
        json!({ "value": format!("{} value", second), "order": second_order }),
    );
    json!({
        "cardId": 1498938915662u64,
        "deckName": "Default",
        "modelName": "Basic",
        "fields": fields,
        "buttons": buttons,
    })
}
