use crate::domain::{ComputeArtifact, ComputeRequest, ComputeResult};

pub trait ModuleExecutor {
    fn execute(&self, request: &ComputeRequest) -> ComputeResult<Vec<ComputeArtifact>>;
}
