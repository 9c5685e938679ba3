use sqlx::prelude::FromRow;

/// The slice of the employee record the approval engine depends on: the
/// static two-tier approver assignment. Employee CRUD itself lives outside
/// this service.
#[derive(Debug, Clone, FromRow)]
pub struct ApproverAssignment {
    pub id: u64,
    pub approver1_id: u64,
    pub approver2_id: Option<u64>,
}
