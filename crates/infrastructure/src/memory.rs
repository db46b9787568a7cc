//! InMemory 実装（開発/テスト用）

use crate::attachment_store::{public_object_url, AttachmentStore};
use crate::todo_repository::TodoRepository;
use async_trait::async_trait;
use domain::{TodoId, TodoItem, TodoUpdate, UserId};
use shared::AppError;
use std::collections::HashMap;
use tokio::sync::Mutex;

type Key = (String, String);

fn key(user_id: &UserId, todo_id: &TodoId) -> Key {
    (user_id.as_str().to_string(), todo_id.as_str().to_string())
}

/// DynamoDB と同じ上書き・存在チェックの挙動を持つリポジトリ
#[derive(Default)]
pub struct InMemoryTodoRepository {
    // 挿入順を保つ
    items: Mutex<Vec<(Key, TodoItem)>>,
    failure: Option<String>,
}

impl InMemoryTodoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// すべての操作が `AppError::DynamoDb` で失敗するリポジトリ
    pub fn failing(message: &str) -> Self {
        Self {
            items: Mutex::default(),
            failure: Some(message.to_string()),
        }
    }

    pub async fn get(&self, user_id: &UserId, todo_id: &TodoId) -> Option<TodoItem> {
        let key = key(user_id, todo_id);
        self.items
            .lock()
            .await
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, item)| item.clone())
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    fn check(&self) -> Result<(), AppError> {
        match &self.failure {
            Some(message) => Err(AppError::DynamoDb(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TodoRepository for InMemoryTodoRepository {
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<TodoItem>, AppError> {
        self.check()?;
        Ok(self
            .items
            .lock()
            .await
            .iter()
            .filter(|(_, item)| item.user_id == *user_id)
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn create(&self, todo: &TodoItem) -> Result<(), AppError> {
        self.check()?;
        let key = key(&todo.user_id, &todo.todo_id);
        let mut items = self.items.lock().await;
        match items.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = todo.clone(),
            None => items.push((key, todo.clone())),
        }
        Ok(())
    }

    async fn update(&self, update: &TodoUpdate) -> Result<(), AppError> {
        self.check()?;
        let key = key(&update.user_id, &update.todo_id);
        let mut items = self.items.lock().await;
        if let Some((_, item)) = items.iter_mut().find(|(k, _)| *k == key) {
            item.name = update.name.clone();
            item.done = update.done;
            if let Some(due_date) = &update.due_date {
                item.due_date = Some(due_date.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, user_id: &UserId, todo_id: &TodoId) -> Result<(), AppError> {
        self.check()?;
        let key = key(user_id, todo_id);
        self.items.lock().await.retain(|(k, _)| *k != key);
        Ok(())
    }

    async fn update_attachment_url(
        &self,
        user_id: &UserId,
        todo_id: &TodoId,
        url: &str,
    ) -> Result<(), AppError> {
        self.check()?;
        let key = key(user_id, todo_id);
        let mut items = self.items.lock().await;
        if let Some((_, item)) = items.iter_mut().find(|(k, _)| *k == key) {
            item.attachment_url = Some(url.to_string());
        }
        Ok(())
    }
}

/// 署名しない Presigned URL を返すオブジェクトストア
pub struct InMemoryAttachmentStore {
    bucket_name: String,
    storage_host: String,
    failure: Option<String>,
    issued: Mutex<HashMap<String, String>>,
}

impl InMemoryAttachmentStore {
    pub fn new(bucket_name: &str, storage_host: &str) -> Self {
        Self {
            bucket_name: bucket_name.to_string(),
            storage_host: storage_host.to_string(),
            failure: None,
            issued: Mutex::default(),
        }
    }

    pub fn failing(bucket_name: &str, storage_host: &str, message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(bucket_name, storage_host)
        }
    }

    /// 発行済みの Presigned URL
    pub async fn issued_url(&self, object_key: &str) -> Option<String> {
        self.issued.lock().await.get(object_key).cloned()
    }
}

#[async_trait]
impl AttachmentStore for InMemoryAttachmentStore {
    async fn presigned_upload_url(&self, object_key: &str) -> Result<String, AppError> {
        if let Some(message) = &self.failure {
            return Err(AppError::ObjectStore(message.clone()));
        }

        let url = format!(
            "{}?X-Amz-Signature=unsigned",
            public_object_url(&self.bucket_name, &self.storage_host, object_key)
        );
        self.issued
            .lock()
            .await
            .insert(object_key.to_string(), url.clone());
        Ok(url)
    }

    fn public_url(&self, object_key: &str) -> String {
        public_object_url(&self.bucket_name, &self.storage_host, object_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CreateTodoRequest, UpdateTodoRequest};

    fn user(id: &str) -> UserId {
        UserId::from_string(id.to_string()).unwrap()
    }

    fn todo(user_id: &UserId, name: &str) -> TodoItem {
        TodoItem::new(
            TodoId::new(),
            user_id.clone(),
            CreateTodoRequest {
                name: name.to_string(),
                due_date: None,
            },
            chrono::Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_user() {
        let repo = InMemoryTodoRepository::new();
        let alice = user("alice");
        let bob = user("bob");
        repo.create(&todo(&alice, "a")).await.unwrap();
        repo.create(&todo(&bob, "b")).await.unwrap();

        let items = repo.list_for_user(&alice).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "a");
    }

    #[tokio::test]
    async fn test_create_overwrites_same_key() {
        let repo = InMemoryTodoRepository::new();
        let alice = user("alice");
        let mut item = todo(&alice, "first");
        repo.create(&item).await.unwrap();

        item.name = "second".to_string();
        repo.create(&item).await.unwrap();

        assert_eq!(repo.len().await, 1);
        assert_eq!(
            repo.get(&alice, &item.todo_id).await.unwrap().name,
            "second"
        );
    }

    #[tokio::test]
    async fn test_update_of_missing_item_is_noop() {
        let repo = InMemoryTodoRepository::new();
        let update = TodoUpdate::new(
            TodoId::new(),
            user("alice"),
            UpdateTodoRequest {
                name: "x".to_string(),
                due_date: None,
                done: true,
            },
            chrono::Utc::now(),
        );

        repo.update(&update).await.unwrap();
        repo.update_attachment_url(&update.user_id, &update.todo_id, "https://x")
            .await
            .unwrap();

        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_failing_repository_returns_dynamodb_error() {
        let repo = InMemoryTodoRepository::failing("boom");
        let result = repo.list_for_user(&user("alice")).await;
        assert!(matches!(result, Err(AppError::DynamoDb(m)) if m == "boom"));
    }
}
