// GraphSON v3 decoding of Gremlin server responses

use super::value::{ElementId, Edge, GKey, GMap, GValue, Vertex, T};
use crate::error::GraphError;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Decodes a full HTTP response body. Server-side failures are reported through
/// `status.code`; the result list is flattened into individual values.
pub fn decode_response(body: &Value) -> Result<Vec<GValue>, GraphError> {
    let status = body.get("status");
    let code = status
        .and_then(|s| s.get("code"))
        .and_then(Value::as_u64)
        .unwrap_or(200);
    if code >= 400 {
        let message = status
            .and_then(|s| s.get("message"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(GraphError::Server {
            status: u16::try_from(code).unwrap_or(u16::MAX),
            message,
        });
    }

    let data = match body.get("result").and_then(|r| r.get("data")) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(data) => decode(data)?,
    };

    match data {
        GValue::List(items) => Ok(items),
        other => Ok(vec![other]),
    }
}

/// Decodes one GraphSON v3 value. Untyped JSON is taken as-is.
pub fn decode(value: &Value) -> Result<GValue, GraphError> {
    let object = match value {
        Value::Object(object) => object,
        other => return Ok(GValue::from_json(other)),
    };

    let (type_tag, inner) = match (object.get("@type"), object.get("@value")) {
        (Some(Value::String(tag)), Some(inner)) => (tag.as_str(), inner),
        _ => {
            let mut map = GMap::new();
            for (k, v) in object {
                map.insert(k.as_str(), decode(v)?);
            }
            return Ok(GValue::Map(map));
        }
    };

    match type_tag {
        "g:List" | "g:Set" => Ok(GValue::List(decode_array(type_tag, inner)?)),
        "g:Map" => decode_map(inner),
        "g:Int32" | "g:Int64" => inner
            .as_i64()
            .map(GValue::Int)
            .ok_or_else(|| mismatch(type_tag, inner)),
        "g:Float" | "g:Double" => decode_float(type_tag, inner),
        "g:Date" | "g:Timestamp" => {
            let millis = inner.as_i64().ok_or_else(|| mismatch(type_tag, inner))?;
            DateTime::<Utc>::from_timestamp_millis(millis)
                .map(GValue::Date)
                .ok_or_else(|| mismatch(type_tag, inner))
        }
        "g:UUID" => inner
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(GValue::Uuid)
            .ok_or_else(|| mismatch(type_tag, inner)),
        "g:T" => inner
            .as_str()
            .and_then(T::from_name)
            .map(GValue::Token)
            .ok_or_else(|| mismatch(type_tag, inner)),
        "g:Vertex" => {
            let fields = expect_object(type_tag, inner)?;
            Ok(GValue::Vertex(Vertex {
                id: element_id(type_tag, fields.get("id"))?,
                label: label(fields),
            }))
        }
        "g:Edge" => {
            let fields = expect_object(type_tag, inner)?;
            Ok(GValue::Edge(Edge {
                id: element_id(type_tag, fields.get("id"))?,
                label: label(fields),
                out_v: element_id(type_tag, fields.get("outV"))?,
                in_v: element_id(type_tag, fields.get("inV"))?,
            }))
        }
        "g:VertexProperty" | "g:Property" => {
            let fields = expect_object(type_tag, inner)?;
            match fields.get("value") {
                Some(v) => decode(v),
                None => Ok(GValue::Null),
            }
        }
        _ => decode(inner),
    }
}

fn decode_array(type_tag: &str, inner: &Value) -> Result<Vec<GValue>, GraphError> {
    inner
        .as_array()
        .ok_or_else(|| mismatch(type_tag, inner))?
        .iter()
        .map(decode)
        .collect()
}

// g:Map is a flat array of alternating keys and values.
fn decode_map(inner: &Value) -> Result<GValue, GraphError> {
    let items = inner.as_array().ok_or_else(|| mismatch("g:Map", inner))?;
    if items.len() % 2 != 0 {
        return Err(GraphError::Decode(format!(
            "g:Map has an odd number of entries ({})",
            items.len()
        )));
    }

    let mut map = GMap::new();
    for pair in items.chunks(2) {
        let key = match decode(&pair[0])? {
            GValue::Token(t) => GKey::Token(t),
            GValue::String(s) => GKey::String(s),
            other => GKey::String(other.to_json().to_string()),
        };
        map.insert(key, decode(&pair[1])?);
    }
    Ok(GValue::Map(map))
}

fn decode_float(type_tag: &str, inner: &Value) -> Result<GValue, GraphError> {
    match inner {
        Value::Number(n) => n.as_f64().map(GValue::Float).ok_or_else(|| mismatch(type_tag, inner)),
        Value::String(s) => match s.as_str() {
            "NaN" => Ok(GValue::Float(f64::NAN)),
            "Infinity" => Ok(GValue::Float(f64::INFINITY)),
            "-Infinity" => Ok(GValue::Float(f64::NEG_INFINITY)),
            _ => Err(mismatch(type_tag, inner)),
        },
        _ => Err(mismatch(type_tag, inner)),
    }
}

fn expect_object<'a>(type_tag: &str, inner: &'a Value) -> Result<&'a Map<String, Value>, GraphError> {
    inner.as_object().ok_or_else(|| mismatch(type_tag, inner))
}

fn element_id(type_tag: &str, raw: Option<&Value>) -> Result<ElementId, GraphError> {
    let raw = raw.ok_or_else(|| GraphError::Decode(format!("{} without id", type_tag)))?;
    ElementId::try_from(decode(raw)?)
        .map_err(|v| GraphError::Decode(format!("{} id of unsupported type {}", type_tag, v.type_name())))
}

fn label(fields: &Map<String, Value>) -> String {
    fields
        .get("label")
        .and_then(Value::as_str)
        .unwrap_or("vertex")
        .to_string()
}

fn mismatch(type_tag: &str, inner: &Value) -> GraphError {
    GraphError::Decode(format!("malformed {} value: {}", type_tag, inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_decode_value_map_with_tokens() {
        let raw = json!({
            "@type": "g:Map",
            "@value": [
                {"@type": "g:T", "@value": "id"}, "u1",
                {"@type": "g:T", "@value": "label"}, "User",
                "age", {"@type": "g:Int32", "@value": 31},
                "created_at", {"@type": "g:Date", "@value": 1682899200000i64}
            ]
        });

        let GValue::Map(map) = decode(&raw).unwrap() else {
            panic!("expected a map");
        };
        assert_eq!(map.get(&GKey::Token(T::Id)), Some(&GValue::from("u1")));
        assert_eq!(map.get(&GKey::Token(T::Label)), Some(&GValue::from("User")));
        assert_eq!(map.get_str("age"), Some(&GValue::Int(31)));
        assert_eq!(
            map.get_str("created_at"),
            Some(&GValue::Date(Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap()))
        );
    }

    #[test]
    fn test_decode_elements() {
        let vertex = json!({"@type": "g:Vertex", "@value": {
            "id": {"@type": "g:Int64", "@value": 7}, "label": "User"
        }});
        assert_eq!(
            decode(&vertex).unwrap(),
            GValue::Vertex(Vertex { id: ElementId::Int(7), label: "User".into() })
        );

        let edge = json!({"@type": "g:Edge", "@value": {
            "id": "e1", "label": "FOLLOWS", "outV": "a", "inV": "b"
        }});
        let GValue::Edge(edge) = decode(&edge).unwrap() else {
            panic!("expected an edge");
        };
        assert_eq!(edge.out_v, ElementId::from("a"));
        assert_eq!(edge.in_v, ElementId::from("b"));
    }

    #[test]
    fn test_decode_response_flattens_result_list() {
        let body = json!({
            "requestId": "r1",
            "status": {"code": 200, "message": ""},
            "result": {"data": {"@type": "g:List", "@value": [
                {"@type": "g:Int64", "@value": 25},
                {"@type": "g:Double", "@value": 2.5}
            ]}, "meta": {}}
        });
        assert_eq!(decode_response(&body).unwrap(), vec![GValue::Int(25), GValue::Float(2.5)]);
    }

    #[test]
    fn test_decode_response_server_error() {
        let body = json!({"status": {"code": 597, "message": "No such property"}});
        match decode_response(&body) {
            Err(GraphError::Server { status, message }) => {
                assert_eq!(status, 597);
                assert_eq!(message, "No such property");
            }
            other => panic!("unexpected: {:?}", other),
        }

        let body = json!({"status": {"code": 70000, "message": "odd"}});
        match decode_response(&body) {
            Err(GraphError::Server { status, .. }) => assert_eq!(status, u16::MAX),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_odd_map() {
        let raw = json!({"@type": "g:Map", "@value": ["a"]});
        assert!(matches!(decode(&raw), Err(GraphError::Decode(_))));
    }
}
