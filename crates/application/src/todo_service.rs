use chrono::Utc;
use domain::{CreateTodoRequest, TodoId, TodoItem, TodoUpdate, UpdateTodoRequest, UserId};
use infrastructure::{AttachmentStore, TodoRepository};
use shared::AppError;
use std::sync::Arc;
use tracing::info;

/// ToDo の業務操作
///
/// 呼び出し元のユーザーはオーソライザーで解決済みの `UserId` として受け取る。
#[derive(Clone)]
pub struct TodoService {
    repository: Arc<dyn TodoRepository>,
    attachments: Arc<dyn AttachmentStore>,
}

impl TodoService {
    pub fn new(repository: Arc<dyn TodoRepository>, attachments: Arc<dyn AttachmentStore>) -> Self {
        Self {
            repository,
            attachments,
        }
    }

    pub async fn list_todos(&self, user_id: &UserId) -> Result<Vec<TodoItem>, AppError> {
        self.repository.list_for_user(user_id).await
    }

    pub async fn create_todo(
        &self,
        request: CreateTodoRequest,
        user_id: &UserId,
    ) -> Result<TodoItem, AppError> {
        request.validate()?;

        let item = TodoItem::new(TodoId::new(), user_id.clone(), request, Utc::now());
        self.repository.create(&item).await?;

        info!(todo_id = %item.todo_id, user_id = %user_id, "ToDo作成完了");
        Ok(item)
    }

    pub async fn update_todo(
        &self,
        todo_id: &TodoId,
        request: UpdateTodoRequest,
        user_id: &UserId,
    ) -> Result<(), AppError> {
        request.validate()?;

        let update = TodoUpdate::new(todo_id.clone(), user_id.clone(), request, Utc::now());
        self.repository.update(&update).await?;

        info!(todo_id = %todo_id, "ToDo更新完了");
        Ok(())
    }

    pub async fn delete_todo(&self, todo_id: &TodoId, user_id: &UserId) -> Result<(), AppError> {
        self.repository.delete(user_id, todo_id).await?;

        info!(todo_id = %todo_id, "ToDo削除完了");
        Ok(())
    }

    /// 添付ファイルの公開 URL を ToDo に記録し、その URL を返す
    pub async fn attach_url(&self, user_id: &UserId, todo_id: &TodoId) -> Result<String, AppError> {
        let url = self.attachments.public_url(todo_id.as_str());
        self.repository
            .update_attachment_url(user_id, todo_id, &url)
            .await?;
        Ok(url)
    }

    /// オブジェクトキーを todoId とするアップロード用 URL
    pub async fn get_upload_url(&self, todo_id: &TodoId) -> Result<String, AppError> {
        self.attachments
            .presigned_upload_url(todo_id.as_str())
            .await
    }
}

/// 読み取り専用の ToDo 操作
///
/// 一覧取得だけを行う Lambda はオブジェクトストアを必要としない。
#[derive(Clone)]
pub struct TodoQueryService {
    repository: Arc<dyn TodoRepository>,
}

impl TodoQueryService {
    pub fn new(repository: Arc<dyn TodoRepository>) -> Self {
        Self { repository }
    }

    pub async fn list_todos(&self, user_id: &UserId) -> Result<Vec<TodoItem>, AppError> {
        self.repository.list_for_user(user_id).await
    }
}
