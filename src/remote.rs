//! Types whose validation and representation live behind HTTP endpoints.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::datatype::{check_size, Attrs, Environment, Representation, SoftType};
use crate::error::{Result, SlotbaseError};

/// What came back from an endpoint: status code and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}
impl Reply {
    pub fn ok(&self) -> bool {
        self.status == 200
    }
}

/// Posts a JSON body to a URL.
pub trait Transport: Send + Sync {
    fn post(&self, url: &str, body: &Value) -> Result<Reply>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
}
impl HttpTransport {
    /// No timeout is applied unless one is given.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}
impl Transport for HttpTransport {
    fn post(&self, url: &str, body: &Value) -> Result<Reply> {
        debug!(url, "posting to remote type endpoint");
        let response = self.client.post(url).json(body).send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(Reply { status, body })
    }
}

pub struct RemoteType {
    name: String,
    validator: Option<String>,
    representer: Option<String>,
    transport: Arc<dyn Transport>,
}
impl RemoteType {
    pub fn new(
        name: &str,
        validator: Option<String>,
        representer: Option<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            name: name.to_uppercase(),
            validator,
            representer,
            transport,
        }
    }
}
impl SoftType for RemoteType {
    fn name(&self) -> &str {
        &self.name
    }
    fn validate(&self, value: &Value, size: usize) -> Result<()> {
        check_size(value, size)?;
        let url = self
            .validator
            .as_deref()
            .ok_or_else(|| SlotbaseError::Unimplemented(format!("{}.validate", self.name)))?;
        let reply = self
            .transport
            .post(url, &json!({ "value": value, "size": size }))?;
        if reply.ok() {
            Ok(())
        } else {
            warn!(type_name = %self.name, status = reply.status, "remote validation rejected value");
            Err(SlotbaseError::ValidationFailed(reply.body))
        }
    }
    fn prepare(&self, value: &Value) -> Result<Value> {
        Ok(value.clone())
    }
    fn render(&self, value: &Value, environment: &Environment) -> Result<Representation> {
        let url = self
            .representer
            .as_deref()
            .ok_or_else(|| SlotbaseError::Unimplemented(format!("{}.render", self.name)))?;
        let reply = self
            .transport
            .post(url, &json!({ "value": value, "environment": environment }))?;
        if reply.ok() {
            Ok(Representation::Text(reply.body))
        } else {
            Err(SlotbaseError::RepresentationFailed(reply.body))
        }
    }
    fn attrs(&self, _: &Value, _: &Environment) -> Result<Attrs> {
        Ok(Attrs::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Canned {
        status: u16,
        seen: Mutex<Vec<(String, Value)>>,
    }
    impl Transport for Canned {
        fn post(&self, url: &str, body: &Value) -> Result<Reply> {
            self.seen.lock().unwrap().push((url.to_owned(), body.clone()));
            Ok(Reply {
                status: self.status,
                body: "nope".into(),
            })
        }
    }

    fn canned(status: u16) -> Arc<Canned> {
        Arc::new(Canned {
            status,
            seen: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn size_is_checked_locally() {
        let transport = canned(200);
        let remote = RemoteType::new("ZIP", Some("http://v/zip".into()), None, transport.clone());
        assert!(matches!(
            remote.validate(&json!("123456"), 5),
            Err(SlotbaseError::SizeExceeded { expected: 5, given: 6 })
        ));
        assert!(transport.seen.lock().unwrap().is_empty());
        remote.validate(&json!("12345"), 5).unwrap();
        assert_eq!(
            transport.seen.lock().unwrap()[0],
            ("http://v/zip".to_owned(), json!({"value": "12345", "size": 5}))
        );
    }

    #[test]
    fn rejection_carries_body() {
        let remote = RemoteType::new("ZIP", Some("http://v/zip".into()), Some("http://r/zip".into()), canned(400));
        match remote.validate(&json!("x"), 5) {
            Err(SlotbaseError::ValidationFailed(body)) => assert_eq!(body, "nope"),
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
        assert!(matches!(
            remote.render(&json!("x"), &Environment::new()),
            Err(SlotbaseError::RepresentationFailed(_))
        ));
    }

    #[test]
    fn missing_endpoint_is_unimplemented() {
        let remote = RemoteType::new("ZIP", None, None, canned(200));
        assert!(matches!(remote.validate(&json!("x"), 5), Err(SlotbaseError::Unimplemented(_))));
        assert!(matches!(
            remote.render(&json!("x"), &Environment::new()),
            Err(SlotbaseError::Unimplemented(_))
        ));
    }
}
