//! Outgoing metadata interceptor.
//!
//! Every unary or stream request carries `client-id: <uuid>`. The id cell is
//! written once during init and read by every call.

use parking_lot::RwLock;
use std::sync::Arc;
use tonic::metadata::MetadataValue;
use tonic::service::Interceptor;
use tonic::Status;

/// Metadata key the controller correlates connections by.
pub const CLIENT_ID_HEADER: &str = "client-id";

/// Stamps the stable client id onto every outgoing request.
#[derive(Clone)]
pub struct ClientIdInterceptor {
    client_id: Arc<RwLock<String>>,
}

impl ClientIdInterceptor {
    pub fn new(client_id: Arc<RwLock<String>>) -> Self {
        Self { client_id }
    }
}

impl Interceptor for ClientIdInterceptor {
    fn call(&mut self, mut request: tonic::Request<()>) -> Result<tonic::Request<()>, Status> {
        let id = self.client_id.read().clone();
        if !id.is_empty() {
            let value = MetadataValue::try_from(id.as_str())
                .map_err(|_| Status::internal("client-id is not valid metadata"))?;
            request.metadata_mut().insert(CLIENT_ID_HEADER, value);
        }
        Ok(request)
    }
}
