//! Request/response protocol between the page collector, the UI surfaces
//! and the alert server. Every request carries a `type` discriminator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::alert::Alert;
use crate::extension::ExtensionRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// Collector → merge engine. The payload is normalized server side.
    PageMutation {
        #[serde(default)]
        payload: Value,
    },
    GetAlerts,
    SetAlerts {
        #[serde(default)]
        alerts: Value,
    },
    ClearAlerts,
    /// Inventory listing. With `sync` set and `extensions` present the
    /// stored inventory is reconciled against the reported list first.
    GetList {
        #[serde(default)]
        sync: bool,
        #[serde(default)]
        extensions: Option<Vec<ExtensionRecord>>,
    },
    ClearNew,
    ExtensionInstalled {
        extension: ExtensionRecord,
    },
    ExtensionEnabled {
        extension: ExtensionRecord,
    },
    ExtensionDisabled {
        extension: ExtensionRecord,
    },
    ExtensionUninstalled {
        id: String,
    },
    GetBadge,
}

impl Message {
    pub fn page_mutation(alert: &Alert) -> Result<Self, serde_json::Error> {
        Ok(Message::PageMutation {
            payload: serde_json::to_value(alert)?,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::PageMutation { .. } => "pageMutation",
            Message::GetAlerts => "getAlerts",
            Message::SetAlerts { .. } => "setAlerts",
            Message::ClearAlerts => "clearAlerts",
            Message::GetList { .. } => "getList",
            Message::ClearNew => "clearNew",
            Message::ExtensionInstalled { .. } => "extensionInstalled",
            Message::ExtensionEnabled { .. } => "extensionEnabled",
            Message::ExtensionDisabled { .. } => "extensionDisabled",
            Message::ExtensionUninstalled { .. } => "extensionUninstalled",
            Message::GetBadge => "getBadge",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Alerts {
        alerts: Vec<Alert>,
    },
    Inventory {
        extensions: Vec<ExtensionRecord>,
        #[serde(rename = "newCount")]
        new_count: usize,
    },
    Badge {
        text: String,
        color: String,
    },
    Ack {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Response {
    pub fn ok() -> Self {
        Response::Ack {
            ok: true,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Ack {
            ok: false,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unit_messages_parse() {
        let msg: Message = serde_json::from_value(json!({"type": "getAlerts"})).unwrap();
        assert!(matches!(msg, Message::GetAlerts));
        let msg: Message = serde_json::from_value(json!({"type": "clearAlerts"})).unwrap();
        assert!(matches!(msg, Message::ClearAlerts));
    }

    #[test]
    fn test_page_mutation_without_payload() {
        let msg: Message = serde_json::from_value(json!({"type": "pageMutation"})).unwrap();
        match msg {
            Message::PageMutation { payload } => assert!(payload.is_null()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_get_list_defaults() {
        let msg: Message = serde_json::from_value(json!({"type": "getList"})).unwrap();
        match msg {
            Message::GetList { sync, extensions } => {
                assert!(!sync);
                assert!(extensions.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_value::<Message>(json!({"type": "selfDestruct"})).is_err());
    }

    #[test]
    fn test_message_round_trip_keeps_discriminator() {
        let alert = Alert::normalize(&json!({"url": "https://a.test/"}));
        let msg = Message::page_mutation(&alert).unwrap();
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "pageMutation");
        assert_eq!(value["payload"]["url"], "https://a.test/");
        assert_eq!(msg.kind(), "pageMutation");
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(serde_json::to_value(Response::ok()).unwrap(), json!({"ok": true}));
        let inv = Response::Inventory {
            extensions: vec![],
            new_count: 2,
        };
        assert_eq!(
            serde_json::to_value(inv).unwrap(),
            json!({"extensions": [], "newCount": 2})
        );
    }
}
