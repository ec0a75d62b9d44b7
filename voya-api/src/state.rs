use std::sync::Arc;

use voya_approval::ApprovalService;
use voya_store::Store;

pub struct AppState<S: Store> {
    pub approvals: Arc<ApprovalService<S>>,
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        AppState {
            approvals: self.approvals.clone(),
        }
    }
}

impl<S: Store> AppState<S> {
    pub fn new(approvals: ApprovalService<S>) -> Self {
        AppState {
            approvals: Arc::new(approvals),
        }
    }
}
