//! Permit request ("demande") management.
//!
//! Clients file requests; filing a request also opens its study dossier and records the
//! metadata of any files uploaded with it. Responsibles and the director browse requests by
//! network.

use crate::error::{RaccordError, RaccordResult};
use crate::records::{Caller, CreatedRequest, Document, DocumentOwner, NewRequest, Request};
use crate::repositories::shared::{non_blank, require_role, unlabelled_documents, UploadedFile};
use crate::status::{RequestType, Role};
use crate::store::DossierStore;
use crate::uuid::Uuid;
use raccord_types::NonEmptyText;
use std::sync::Arc;

/// Fields a client submits when filing a request.
#[derive(Clone, Debug, Default)]
pub struct RequestInput {
    pub title: String,
    pub city: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub remarks: Option<String>,
    pub files: Vec<UploadedFile>,
}

/// A request with the documents filed alongside it.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestDetail {
    pub request: Request,
    pub documents: Vec<Document>,
}

const REVIEWERS: &[Role] = &[Role::RespAep, Role::RespAsseu, Role::Directeur];

/// Service for filing and browsing permit requests.
#[derive(Clone)]
pub struct RequestService {
    store: Arc<dyn DossierStore>,
}

impl RequestService {
    pub fn new(store: Arc<dyn DossierStore>) -> Self {
        Self { store }
    }

    /// Files a request for the calling client.
    ///
    /// The request, its `EN_COURS` study dossier and its document metadata are written together.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the caller is not a client
    /// - `InvalidInput` if the title is blank or a file path is not acceptable
    pub async fn create(
        &self,
        caller: &Caller,
        request_type: RequestType,
        input: RequestInput,
    ) -> RaccordResult<CreatedRequest> {
        require_role(caller, &[Role::Client], "file requests")?;
        let title = NonEmptyText::new(&input.title)
            .map_err(|_| RaccordError::InvalidInput("title is required".into()))?;

        let created = self
            .store
            .create_request(NewRequest {
                client_id: caller.id,
                request_type,
                title,
                city: non_blank(input.city),
                address: non_blank(input.address),
                description: non_blank(input.description),
                remarks: non_blank(input.remarks),
                documents: unlabelled_documents(input.files)?,
            })
            .await?;

        tracing::info!(
            "request {} ({}) filed by client {} with {} document(s)",
            created.request.id,
            created.request.request_type,
            caller.id,
            created.documents.len()
        );
        Ok(created)
    }

    /// The calling client's requests, newest first.
    pub async fn list_mine(&self, caller: &Caller) -> RaccordResult<Vec<RequestDetail>> {
        require_role(caller, &[Role::Client], "list their own requests")?;
        let requests = self.store.requests_for_client(caller.id).await?;
        self.with_documents(requests).await
    }

    /// Requests a listing for `request_type` covers (see [`RequestType::listing_types`]).
    pub async fn list_by_type(
        &self,
        caller: &Caller,
        request_type: RequestType,
    ) -> RaccordResult<Vec<RequestDetail>> {
        require_role(caller, REVIEWERS, "browse requests")?;
        let requests = self
            .store
            .requests_by_types(request_type.listing_types())
            .await?;
        self.with_documents(requests).await
    }

    /// One request. Clients may only read their own.
    pub async fn get(&self, caller: &Caller, id: Uuid) -> RaccordResult<RequestDetail> {
        let request = self.store.request(id).await?;
        if caller.role == Role::Client && request.client_id != caller.id {
            return Err(RaccordError::Unauthorized(format!(
                "request {id} belongs to another client"
            )));
        }
        let documents = self.store.documents_for(DocumentOwner::Request(id)).await?;
        Ok(RequestDetail { request, documents })
    }

    async fn with_documents(&self, requests: Vec<Request>) -> RaccordResult<Vec<RequestDetail>> {
        let mut out = Vec::with_capacity(requests.len());
        for request in requests {
            let documents = self
                .store
                .documents_for(DocumentOwner::Request(request.id))
                .await?;
            out.push(RequestDetail { request, documents });
        }
        Ok(out)
    }
}
