//! In-memory payment provider with scripted sessions.

use async_trait::async_trait;
use imgshift_services::payment::validate_session_id;
use imgshift_services::{
    CheckoutRequest, CheckoutSession, PaymentProvider, PaymentProviderError, SessionStatus,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct ScriptedProvider {
    sessions: HashMap<String, SessionStatus>,
    failing: bool,
    created: Mutex<Vec<CheckoutRequest>>,
    lookups: AtomicUsize,
}

impl ScriptedProvider {
    /// A provider whose every call fails as if the network were down.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn with_session(
        mut self,
        id: &str,
        payment_status: &str,
        files: Option<i64>,
        format: Option<&str>,
    ) -> Self {
        let mut metadata = BTreeMap::new();
        if let Some(files) = files {
            metadata.insert("files".to_string(), files.to_string());
        }
        if let Some(format) = format {
            metadata.insert("format".to_string(), format.to_string());
        }
        self.sessions.insert(
            id.to_string(),
            SessionStatus {
                id: id.to_string(),
                payment_status: payment_status.to_string(),
                metadata,
            },
        );
        self
    }

    pub fn with_paid_session(self, id: &str, files: i64, format: &str) -> Self {
        self.with_session(id, "paid", Some(files), Some(format))
    }

    pub fn created_requests(&self) -> Vec<CheckoutRequest> {
        self.created.lock().unwrap().clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for ScriptedProvider {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentProviderError> {
        if self.failing {
            return Err(PaymentProviderError::Api {
                status: 500,
                message: "scripted failure".to_string(),
            });
        }
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        let id = format!("cs_test_{}", created.len());
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.example/pay/{}", id)),
            id,
        })
    }

    async fn retrieve_session(
        &self,
        session_id: &str,
    ) -> Result<SessionStatus, PaymentProviderError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        validate_session_id(session_id)?;
        if self.failing {
            return Err(PaymentProviderError::Http("connection refused".to_string()));
        }
        self.sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| PaymentProviderError::Api {
                status: 404,
                message: format!("No such checkout.session: '{}'", session_id),
            })
    }
}
