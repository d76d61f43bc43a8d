//! Structural diff between two plugin payloads.
//!
//! Objects are compared key by key and arrays index by index; every leaf
//! difference becomes one [`PayloadChange`] addressed by a JSON pointer.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ChangeKind {
  Added { value: Value },
  Removed { value: Value },
  Changed { from: Value, to: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadChange {
  /// RFC 6901 pointer into the payload; `""` is the root.
  pub path: String,
  #[serde(flatten)]
  pub kind: ChangeKind,
}

/// Changes that turn `base` into `current`, ordered by path.
pub fn diff_payloads(base: &Value, current: &Value) -> Vec<PayloadChange> {
  let mut changes = Vec::new();
  walk(String::new(), base, current, &mut changes);
  changes
}

fn walk(path: String, base: &Value, current: &Value, out: &mut Vec<PayloadChange>) {
  match (base, current) {
    (Value::Object(a), Value::Object(b)) => {
      let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
      keys.sort();
      keys.dedup();
      for key in keys {
        let child = format!("{path}/{}", escape(key));
        match (a.get(key), b.get(key)) {
          (Some(x), Some(y)) => walk(child, x, y, out),
          (Some(x), None) => out.push(PayloadChange {
            path: child,
            kind: ChangeKind::Removed { value: x.clone() },
          }),
          (None, Some(y)) => out.push(PayloadChange {
            path: child,
            kind: ChangeKind::Added { value: y.clone() },
          }),
          (None, None) => {}
        }
      }
    }
    (Value::Array(a), Value::Array(b)) => {
      for i in 0..a.len().max(b.len()) {
        let child = format!("{path}/{i}");
        match (a.get(i), b.get(i)) {
          (Some(x), Some(y)) => walk(child, x, y, out),
          (Some(x), None) => out.push(PayloadChange {
            path: child,
            kind: ChangeKind::Removed { value: x.clone() },
          }),
          (None, Some(y)) => out.push(PayloadChange {
            path: child,
            kind: ChangeKind::Added { value: y.clone() },
          }),
          (None, None) => {}
        }
      }
    }
    (x, y) if x == y => {}
    (x, y) => out.push(PayloadChange {
      path,
      kind: ChangeKind::Changed {
        from: x.clone(),
        to:   y.clone(),
      },
    }),
  }
}

fn escape(key: &str) -> String { key.replace('~', "~0").replace('/', "~1") }

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn identical_payloads_have_no_changes() {
    let v = json!({ "a": [1, 2, { "b": null }] });
    assert!(diff_payloads(&v, &v).is_empty());
  }

  #[test]
  fn reports_added_removed_and_changed_leaves() {
    let base = json!({ "ports": [22, 80], "asn": "AS1", "old": true });
    let current = json!({ "ports": [22, 443, 8080], "asn": "AS1", "new/key": 1 });

    let changes = diff_payloads(&base, &current);
    assert_eq!(changes, vec![
      PayloadChange {
        path: "/new~1key".into(),
        kind: ChangeKind::Added { value: json!(1) },
      },
      PayloadChange {
        path: "/old".into(),
        kind: ChangeKind::Removed { value: json!(true) },
      },
      PayloadChange {
        path: "/ports/1".into(),
        kind: ChangeKind::Changed { from: json!(80), to: json!(443) },
      },
      PayloadChange {
        path: "/ports/2".into(),
        kind: ChangeKind::Added { value: json!(8080) },
      },
    ]);
  }

  #[test]
  fn type_change_at_root() {
    let changes = diff_payloads(&Value::Null, &json!({ "a": 1 }));
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].path, "");
  }
}
