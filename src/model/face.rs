use sqlx::prelude::FromRow;

/// Stored face reference for one employee: a 128-d vector serialized as a
/// JSON array. Write-once; re-registration is an admin-only operation.
#[derive(Debug, Clone, FromRow)]
pub struct FaceDescriptorRow {
    pub employee_id: u64,
    pub descriptor: String,
}

impl FaceDescriptorRow {
    pub fn vector(&self) -> Result<Vec<f32>, serde_json::Error> {
        serde_json::from_str(&self.descriptor)
    }
}
