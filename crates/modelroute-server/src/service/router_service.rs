//! ModelRouter service implementation.

use std::pin::Pin;
use std::sync::Arc;

use tokio_stream::StreamExt;
use tonic::{Request, Response, Status};
use tracing::info;

use modelroute_core::{ContextUpdate, Task};
use modelroute_proto::convert::backend_from_wire;
use modelroute_proto::pb;
use modelroute_proto::{ModelRouter, ModelRouterServer};

use crate::progress::ProgressStream;
use crate::scheduler::SchedulerError;
use crate::state::AppState;

/// ModelRouter implementation.
pub struct ModelRouterServiceImpl {
    state: Arc<AppState>,
}

impl ModelRouterServiceImpl {
    /// Create a new ModelRouterServiceImpl.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Convert into a tonic server.
    pub fn into_server(self) -> ModelRouterServer<Self> {
        ModelRouterServer::new(self)
    }

    async fn submit(&self, task: pb::Task) -> Result<ProgressStream, Status> {
        let task = Task::try_from(task).map_err(|e| Status::invalid_argument(e.to_string()))?;
        self.state.scheduler.submit(task).await.map_err(|e| match e {
            SchedulerError::Rejected(e) if e.is_rejection() => {
                Status::invalid_argument(e.to_string())
            }
            SchedulerError::Rejected(e) => Status::internal(e.to_string()),
            SchedulerError::ShuttingDown => Status::unavailable("Server is shutting down"),
        })
    }
}

#[tonic::async_trait]
impl ModelRouter for ModelRouterServiceImpl {
    type StreamTaskProgressStream =
        Pin<Box<dyn tokio_stream::Stream<Item = Result<pb::TaskResult, Status>> + Send>>;

    async fn process_task(
        &self,
        request: Request<pb::Task>,
    ) -> Result<Response<pb::TaskResult>, Status> {
        let stream = self.submit(request.into_inner()).await?;
        let task_id = stream.task_id().clone();

        // Dropping this future (client gone) drops the stream, which
        // cancels the task.
        let event = stream
            .wait_terminal()
            .await
            .ok_or_else(|| Status::internal(format!("Task {task_id} ended without a result")))?;

        info!(task_id = %task_id, status = %event.status, "ProcessTask finished");
        Ok(Response::new(event.into()))
    }

    async fn get_model_capabilities(
        &self,
        request: Request<pb::GetModelCapabilitiesRequest>,
    ) -> Result<Response<pb::ModelCapabilities>, Status> {
        let req = request.into_inner();
        let backend = backend_from_wire(req.model_type)
            .map_err(|e| Status::invalid_argument(e.to_string()))?
            .ok_or_else(|| Status::invalid_argument("model_type is required"))?;

        let caps = self
            .state
            .registry
            .capabilities_of(backend)
            .ok_or_else(|| Status::not_found(format!("Backend not registered: {backend}")))?;

        Ok(Response::new(caps.into()))
    }

    async fn update_context(
        &self,
        request: Request<pb::Context>,
    ) -> Result<Response<pb::Context>, Status> {
        let update = ContextUpdate::from(request.into_inner());
        let merged = self.state.sessions.merge(&update).await;

        info!(
            session_id = %merged.session_id,
            metadata = merged.metadata.len(),
            "Context updated"
        );
        Ok(Response::new(merged.into()))
    }

    async fn stream_task_progress(
        &self,
        request: Request<pb::Task>,
    ) -> Result<Response<Self::StreamTaskProgressStream>, Status> {
        let stream = self.submit(request.into_inner()).await?;
        let task_id = stream.task_id().clone();
        info!(task_id = %task_id, "Streaming task progress");

        let output = stream.map(|event| Ok(pb::TaskResult::from(event)));
        Ok(Response::new(Box::pin(output) as Self::StreamTaskProgressStream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{BackendProfile, RegistryTable};
    use crate::state::test_state;
    use modelroute_core::{BackendId, ModelCapabilities, TaskType};

    fn wire_task(task_type: pb::TaskType, input: &str) -> pb::Task {
        pb::Task {
            task_id: String::new(),
            task_type: task_type as i32,
            input: input.to_string(),
            context: Some(pb::Context {
                session_id: "s1".to_string(),
                ..Default::default()
            }),
            priority: pb::Priority::Medium as i32,
            preferred_model: None,
            confidence_threshold: 0.7,
            dependencies: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_process_task_returns_final_result() {
        let service = ModelRouterServiceImpl::new(test_state().await);
        let result = service
            .process_task(Request::new(wire_task(pb::TaskType::Generation, "write a parser")))
            .await
            .unwrap()
            .into_inner();

        assert!(result.success);
        assert_eq!(result.status, pb::TaskStatus::Completed as i32);
        assert_eq!(result.executed_by, pb::ModelType::Deepseek as i32);
        assert!(!result.task_id.is_empty());
        assert_eq!(result.updated_context.unwrap().previous_tasks, vec![result.task_id]);
    }

    #[tokio::test]
    async fn test_stream_ends_with_single_terminal_message() {
        let service = ModelRouterServiceImpl::new(test_state().await);
        let stream = service
            .stream_task_progress(Request::new(wire_task(pb::TaskType::Explanation, "explain")))
            .await
            .unwrap()
            .into_inner();

        let messages: Vec<pb::TaskResult> = stream.map(|m| m.unwrap()).collect().await;
        let terminal = pb::TaskStatus::Completed as i32;
        assert_eq!(messages.first().unwrap().status, pb::TaskStatus::Running as i32);
        assert_eq!(messages.last().unwrap().status, terminal);
        assert_eq!(messages.iter().filter(|m| m.status == terminal).count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_task_is_rejected() {
        let service = ModelRouterServiceImpl::new(test_state().await);

        let status = service
            .process_task(Request::new(wire_task(pb::TaskType::Unknown, "x")))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let mut cyclic = wire_task(pb::TaskType::Generation, "x");
        cyclic.task_id = "a".to_string();
        cyclic.dependencies = vec!["a".to_string()];
        let status = service.process_task(Request::new(cyclic)).await.unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_get_model_capabilities() {
        let state = test_state().await;
        let service = ModelRouterServiceImpl::new(state.clone());

        let caps = service
            .get_model_capabilities(Request::new(pb::GetModelCapabilitiesRequest {
                model_type: pb::ModelType::Phi as i32,
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(caps.max_confidence, 0.8);
        assert_eq!(caps.max_tokens, 4096);

        let status = service
            .get_model_capabilities(Request::new(pb::GetModelCapabilitiesRequest {
                model_type: pb::ModelType::Unspecified as i32,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        state.registry.replace(
            RegistryTable::new([BackendProfile::new(
                ModelCapabilities::new(BackendId::Phi).with_tasks([TaskType::Documentation]),
                100,
            )])
            .unwrap(),
        );
        let status = service
            .get_model_capabilities(Request::new(pb::GetModelCapabilitiesRequest {
                model_type: pb::ModelType::Mixtral as i32,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn test_updated_context_reaches_next_task() {
        let state = test_state().await;
        let service = ModelRouterServiceImpl::new(state.clone());

        let merged = service
            .update_context(Request::new(pb::Context {
                session_id: "s1".to_string(),
                metadata: [("project".to_string(), "parser".to_string())].into(),
                confidence_score: Some(0.4),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(merged.metadata.get("project"), Some(&"parser".to_string()));
        assert_eq!(merged.confidence_score, Some(0.4));

        let result = service
            .process_task(Request::new(wire_task(pb::TaskType::Generation, "add tests")))
            .await
            .unwrap()
            .into_inner();
        let context = result.updated_context.unwrap();
        assert_eq!(context.metadata.get("project"), Some(&"parser".to_string()));
    }

    #[tokio::test]
    async fn test_metadata_only_update_keeps_confidence_trend() {
        let service = ModelRouterServiceImpl::new(test_state().await);

        let result = service
            .process_task(Request::new(wire_task(pb::TaskType::Generation, "add tests")))
            .await
            .unwrap()
            .into_inner();
        let trend = result.updated_context.unwrap().confidence_score.unwrap();
        assert!(trend > 0.0);

        let merged = service
            .update_context(Request::new(pb::Context {
                session_id: "s1".to_string(),
                metadata: [("editor".to_string(), "helix".to_string())].into(),
                confidence_score: None,
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(merged.confidence_score, Some(trend));
        assert_eq!(merged.metadata.get("editor"), Some(&"helix".to_string()));
    }
}
