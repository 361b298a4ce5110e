//! Test-only stand-ins for the network and interactive seams.

use std::cell::RefCell;

use serde_json::Value;

use crate::api::{HttpResponse, Transport};
use crate::error::TstError;
use crate::ui::Prompter;

/// Replays canned responses in order (the final one repeats) and records
/// every request made against it.
pub struct StubTransport {
    responses: RefCell<Vec<HttpResponse>>,
    pub calls: RefCell<Vec<String>>,
    pub patch_payloads: RefCell<Vec<Value>>,
}

impl StubTransport {
    pub fn new(responses: Vec<HttpResponse>) -> Self {
        StubTransport {
            responses: RefCell::new(responses),
            calls: RefCell::new(Vec::new()),
            patch_payloads: RefCell::new(Vec::new()),
        }
    }

    pub fn ok(body: &str) -> HttpResponse {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: body.to_string(),
        }
    }

    pub fn request_count(&self) -> usize {
        self.calls.borrow().len()
    }

    fn next(&self) -> HttpResponse {
        let mut responses = self.responses.borrow_mut();
        assert!(!responses.is_empty(), "stub transport has no canned response");
        if responses.len() == 1 {
            responses[0].clone()
        } else {
            responses.remove(0)
        }
    }
}

impl Transport for StubTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, TstError> {
        self.calls.borrow_mut().push(format!("GET {url}"));
        Ok(self.next())
    }

    fn patch(&self, url: &str, payload: &Value) -> Result<HttpResponse, TstError> {
        self.calls.borrow_mut().push(format!("PATCH {url}"));
        self.patch_payloads.borrow_mut().push(payload.clone());
        Ok(self.next())
    }
}

/// Prompter with scripted answers; records every prompt it was shown.
pub struct StubPrompter {
    confirm_answer: bool,
    inputs: Vec<String>,
    pub asked: Vec<String>,
}

impl StubPrompter {
    pub fn accepting() -> Self {
        StubPrompter {
            confirm_answer: true,
            inputs: Vec::new(),
            asked: Vec::new(),
        }
    }

    pub fn declining() -> Self {
        StubPrompter {
            confirm_answer: false,
            ..Self::accepting()
        }
    }

    pub fn with_inputs(inputs: &[&str]) -> Self {
        StubPrompter {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            ..Self::accepting()
        }
    }
}

impl Prompter for StubPrompter {
    fn confirm(&mut self, prompt: &str, _default: bool) -> Result<bool, TstError> {
        self.asked.push(prompt.to_string());
        Ok(self.confirm_answer)
    }

    fn input(&mut self, prompt: &str) -> Result<String, TstError> {
        self.asked.push(prompt.to_string());
        assert!(!self.inputs.is_empty(), "unexpected prompt: {prompt}");
        Ok(self.inputs.remove(0))
    }
}
