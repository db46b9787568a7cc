use crate::models::{item_to_todo, todo_to_item, Item};
use crate::DynamoDbClient;
use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use domain::{TodoId, TodoItem, TodoUpdate, UserId};
use shared::telemetry::trace_store_operation;
use shared::AppError;
use tracing::{debug, info, warn};

const STORE: &str = "dynamodb";

/// ToDo の永続化
///
/// 各操作は 1 レコードに対する 1 回の呼び出しで完結する。
#[async_trait]
pub trait TodoRepository: Send + Sync {
    /// ユーザーの ToDo をすべて取得する（順序はストア依存）
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<TodoItem>, AppError>;

    /// 同じキーのアイテムがあれば上書きする
    async fn create(&self, todo: &TodoItem) -> Result<(), AppError>;

    /// 存在しないキーに対しては何もしない
    async fn update(&self, update: &TodoUpdate) -> Result<(), AppError>;

    async fn delete(&self, user_id: &UserId, todo_id: &TodoId) -> Result<(), AppError>;

    /// `attachmentUrl` だけを書き換える。存在しないキーに対しては何もしない
    async fn update_attachment_url(
        &self,
        user_id: &UserId,
        todo_id: &TodoId,
        url: &str,
    ) -> Result<(), AppError>;
}

pub struct DynamoDbTodoRepository {
    db: DynamoDbClient,
}

impl DynamoDbTodoRepository {
    pub fn new(db: DynamoDbClient) -> Self {
        Self { db }
    }

    fn key(user_id: &UserId, todo_id: &TodoId) -> Item {
        let mut key = Item::new();
        key.insert(
            "todoId".to_string(),
            AttributeValue::S(todo_id.as_str().to_string()),
        );
        key.insert(
            "userId".to_string(),
            AttributeValue::S(user_id.as_str().to_string()),
        );
        key
    }
}

fn dynamodb_error<E>(error: E) -> AppError
where
    E: std::error::Error + 'static,
{
    AppError::DynamoDb(DisplayErrorContext(&error).to_string())
}

#[async_trait]
impl TodoRepository for DynamoDbTodoRepository {
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<TodoItem>, AppError> {
        info!(user_id = %user_id, "ToDo 一覧を取得中");

        let mut todos = Vec::new();
        let mut exclusive_start_key: Option<Item> = None;

        // LastEvaluatedKey がなくなるまでページを辿る
        loop {
            let request = self
                .db
                .client()
                .query()
                .table_name(self.db.table_name())
                .index_name(self.db.index_name())
                .key_condition_expression("userId = :userId")
                .expression_attribute_values(
                    ":userId",
                    AttributeValue::S(user_id.as_str().to_string()),
                )
                .set_exclusive_start_key(exclusive_start_key.take())
                .send();

            let output = trace_store_operation(STORE, "Query", async {
                request.await.map_err(dynamodb_error)
            })
            .await?;

            for item in output.items() {
                todos.push(item_to_todo(item)?);
            }

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key.clone()),
                _ => break,
            }
        }

        debug!("ToDo 一覧取得完了: {} 件", todos.len());
        Ok(todos)
    }

    async fn create(&self, todo: &TodoItem) -> Result<(), AppError> {
        info!(todo_id = %todo.todo_id, user_id = %todo.user_id, "ToDo を保存中");

        let request = self
            .db
            .client()
            .put_item()
            .table_name(self.db.table_name())
            .set_item(Some(todo_to_item(todo)))
            .send();

        trace_store_operation(STORE, "PutItem", async {
            request.await.map_err(dynamodb_error)
        })
        .await?;

        Ok(())
    }

    async fn update(&self, update: &TodoUpdate) -> Result<(), AppError> {
        info!(todo_id = %update.todo_id, user_id = %update.user_id, "ToDo を更新中");

        // name は予約語のためプレースホルダーを使う
        let mut update_parts = vec!["#name = :name", "done = :done"];
        let mut builder = self
            .db
            .client()
            .update_item()
            .table_name(self.db.table_name())
            .set_key(Some(Self::key(&update.user_id, &update.todo_id)))
            .condition_expression("attribute_exists(todoId)")
            .expression_attribute_names("#name", "name")
            .expression_attribute_values(":name", AttributeValue::S(update.name.clone()))
            .expression_attribute_values(":done", AttributeValue::Bool(update.done));

        if let Some(due_date) = &update.due_date {
            update_parts.push("dueDate = :dueDate");
            builder = builder
                .expression_attribute_values(":dueDate", AttributeValue::S(due_date.clone()));
        }

        let request = builder
            .update_expression(format!("SET {}", update_parts.join(", ")))
            .send();

        match trace_store_operation(STORE, "UpdateItem", request).await {
            Ok(_) => Ok(()),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                warn!(todo_id = %update.todo_id, "更新対象の ToDo が存在しません");
                Ok(())
            }
            Err(e) => Err(dynamodb_error(e)),
        }
    }

    async fn delete(&self, user_id: &UserId, todo_id: &TodoId) -> Result<(), AppError> {
        info!(todo_id = %todo_id, user_id = %user_id, "ToDo を削除中");

        let request = self
            .db
            .client()
            .delete_item()
            .table_name(self.db.table_name())
            .set_key(Some(Self::key(user_id, todo_id)))
            .send();

        trace_store_operation(STORE, "DeleteItem", async {
            request.await.map_err(dynamodb_error)
        })
        .await?;

        Ok(())
    }

    async fn update_attachment_url(
        &self,
        user_id: &UserId,
        todo_id: &TodoId,
        url: &str,
    ) -> Result<(), AppError> {
        info!(todo_id = %todo_id, user_id = %user_id, "添付ファイル URL を設定中");

        let request = self
            .db
            .client()
            .update_item()
            .table_name(self.db.table_name())
            .set_key(Some(Self::key(user_id, todo_id)))
            .condition_expression("attribute_exists(todoId)")
            .update_expression("SET attachmentUrl = :attachmentUrl")
            .expression_attribute_values(":attachmentUrl", AttributeValue::S(url.to_string()))
            .send();

        match trace_store_operation(STORE, "UpdateItem", request).await {
            Ok(_) => Ok(()),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                warn!(todo_id = %todo_id, "添付先の ToDo が存在しません");
                Ok(())
            }
            Err(e) => Err(dynamodb_error(e)),
        }
    }
}
