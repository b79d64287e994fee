use std::collections::VecDeque;
use std::future::Future;
use std::io::{Error as IoError, ErrorKind};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::transport::{Request, Response, Transport};

/// A transport that replays scripted responses and records what was sent.
///
/// Every `send` yields once before answering, so concurrent callers get to interleave the way
/// they would against a real server.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Result<Response>>>,
    sent: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport::default()
    }

    pub fn with_response(self, response: Response) -> MockTransport {
        self.push(Ok(response));
        self
    }

    pub fn with_error(self, error: Error) -> MockTransport {
        self.push(Err(error));
        self
    }

    pub fn push(&self, reply: Result<Response>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.sent.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        self.sent.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(IoError::new(ErrorKind::ConnectionRefused, "MockTransport: nothing scripted").into())
        });
        async move {
            tokio::task::yield_now().await;
            reply
        }
    }
}
