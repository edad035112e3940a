//! In-memory collaborator doubles shared by workflow and API tests.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{
    AttachmentStore, CaptureResult, EmailMessage, Folder, IntegrationError, Notifier,
    OrderDetails, PaymentGateway, PaymentOrder, StoredFile,
};

/// Records every message; fails every send when `failing` is set.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub failing: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, message: &EmailMessage) -> Result<(), IntegrationError> {
        if self.failing {
            return Err(IntegrationError::Status {
                service: "Mail relay",
                status: 502,
                body: "relay down".into(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAttachmentStore {
    pub files: Mutex<HashMap<(Folder, String), Vec<u8>>>,
    pub failing: bool,
}

impl MemoryAttachmentStore {
    pub fn failing() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            failing: true,
        }
    }

    pub fn get(&self, folder: Folder, name: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(&(folder, name.to_string())).cloned()
    }
}

impl AttachmentStore for MemoryAttachmentStore {
    fn upload(&self, bytes: &[u8], name: &str, folder: Folder) -> Result<StoredFile, IntegrationError> {
        if self.failing {
            return Err(IntegrationError::Io(std::io::Error::other("disk full")));
        }
        self.files
            .lock()
            .unwrap()
            .insert((folder, name.to_string()), bytes.to_vec());
        Ok(StoredFile {
            id: name.to_string(),
            link: format!("memory://{}/{}", folder.as_str(), name),
        })
    }

    fn read(&self, folder: Folder, name: &str) -> Result<Option<Vec<u8>>, IntegrationError> {
        Ok(self.get(folder, name))
    }
}

/// Creates orders `ORDER-<n>` and captures anything with the given status.
/// Only created orders can be looked up; they report COMPLETED once captured.
pub struct FakeGateway {
    pub created: Mutex<Vec<(u32, String)>>,
    pub captured: Mutex<Vec<String>>,
    pub capture_status: String,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            created: Mutex::new(Vec::new()),
            captured: Mutex::new(Vec::new()),
            capture_status: "COMPLETED".into(),
        }
    }
}

impl FakeGateway {
    /// Create and capture an order for `amount_cents`, returning its id.
    pub fn paid_order(&self, amount_cents: u32) -> String {
        let order = self.create_order(amount_cents, "test").unwrap();
        self.capture_order(&order.id).unwrap();
        order.id
    }
}

impl PaymentGateway for FakeGateway {
    fn create_order(&self, amount_cents: u32, description: &str) -> Result<PaymentOrder, IntegrationError> {
        let mut created = self.created.lock().unwrap();
        created.push((amount_cents, description.to_string()));
        Ok(PaymentOrder {
            id: format!("ORDER-{}", created.len()),
            status: "CREATED".into(),
            approve_url: Some("https://paypal.test/approve".into()),
        })
    }

    fn capture_order(&self, order_id: &str) -> Result<CaptureResult, IntegrationError> {
        if self.capture_status == "COMPLETED" {
            self.captured.lock().unwrap().push(order_id.to_string());
        }
        Ok(CaptureResult {
            order_id: order_id.to_string(),
            status: self.capture_status.clone(),
        })
    }

    fn order_details(&self, order_id: &str) -> Result<OrderDetails, IntegrationError> {
        let amount_cents = order_id
            .strip_prefix("ORDER-")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| self.created.lock().unwrap().get(i).map(|(cents, _)| *cents));
        let Some(amount_cents) = amount_cents else {
            return Err(IntegrationError::Status {
                service: "PayPal",
                status: 404,
                body: "RESOURCE_NOT_FOUND".into(),
            });
        };
        let captured = self.captured.lock().unwrap().iter().any(|id| id == order_id);
        Ok(OrderDetails {
            id: order_id.to_string(),
            status: if captured { "COMPLETED" } else { "APPROVED" }.into(),
            amount_cents: Some(amount_cents),
            currency: Some("USD".into()),
        })
    }
}
