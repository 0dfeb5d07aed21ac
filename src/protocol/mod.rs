// The MIT License (MIT)
//
// Copyright (c) 2016 AT&T
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! Wire format of the v1 scheduler API: record framing, call bodies and event frames.

pub mod calls;
pub mod events;
pub mod recordio;

use rustc_serialize::json::{Json, Object};

pub const SCHEDULER_PATH: &'static str = "/api/v1/scheduler";
pub const STREAM_ID_HEADER: &'static str = "Mesos-Stream-Id";
pub const JSON_CONTENT: &'static str = "application/json";

pub fn object(pairs: Vec<(&str, Json)>) -> Json {
    let mut map = Object::new();
    for (key, value) in pairs {
        map.insert(key.to_string(), value);
    }
    Json::Object(map)
}

/// `{"value": id}`, the shape of every Mesos identifier.
pub fn id_value(id: &str) -> Json {
    object(vec![("value", Json::String(id.to_string()))])
}

/// Reads the identifier stored as `{"value": ...}` under `key`.
pub fn value_of<'a>(json: &'a Json, key: &str) -> Option<&'a str> {
    json.find_path(&[key, "value"]).and_then(|value| value.as_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_nested_identifiers() {
        let json = object(vec![("task_id", id_value("t1")), ("state", Json::String("TASK_RUNNING".to_string()))]);
        assert_eq!(value_of(&json, "task_id"), Some("t1"));
        assert_eq!(value_of(&json, "state"), None);
        assert_eq!(value_of(&json, "agent_id"), None);
    }
}
