use aws_sdk_dynamodb::types::AttributeValue;
use domain::{TodoId, TodoItem, UserId};
use shared::AppError;
use std::collections::HashMap;

pub type Item = HashMap<String, AttributeValue>;

/// TodoItem を DynamoDB アイテムに変換
///
/// 値のない `dueDate` / `attachmentUrl` は書き込まない。
pub fn todo_to_item(todo: &TodoItem) -> Item {
    let mut item = HashMap::new();
    item.insert(
        "todoId".to_string(),
        AttributeValue::S(todo.todo_id.as_str().to_string()),
    );
    item.insert(
        "userId".to_string(),
        AttributeValue::S(todo.user_id.as_str().to_string()),
    );
    item.insert("name".to_string(), AttributeValue::S(todo.name.clone()));
    item.insert(
        "createdAt".to_string(),
        AttributeValue::S(todo.created_at.clone()),
    );
    item.insert("done".to_string(), AttributeValue::Bool(todo.done));

    if let Some(due_date) = &todo.due_date {
        item.insert("dueDate".to_string(), AttributeValue::S(due_date.clone()));
    }
    if let Some(url) = &todo.attachment_url {
        item.insert("attachmentUrl".to_string(), AttributeValue::S(url.clone()));
    }

    item
}

/// DynamoDB アイテムから TodoItem を復元
pub fn item_to_todo(item: &Item) -> Result<TodoItem, AppError> {
    Ok(TodoItem {
        todo_id: TodoId::from_string(required_string(item, "todoId")?)?,
        user_id: UserId::from_string(required_string(item, "userId")?)?,
        name: required_string(item, "name")?,
        created_at: required_string(item, "createdAt")?,
        due_date: optional_string(item, "dueDate"),
        done: item
            .get("done")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .ok_or_else(|| missing("done"))?,
        attachment_url: optional_string(item, "attachmentUrl"),
    })
}

fn required_string(item: &Item, name: &str) -> Result<String, AppError> {
    optional_string(item, name).ok_or_else(|| missing(name))
}

fn optional_string(item: &Item, name: &str) -> Option<String> {
    item.get(name).and_then(|v| v.as_s().ok()).cloned()
}

fn missing(name: &str) -> AppError {
    AppError::Deserialization(format!("アイテムに {name} 属性がありません"))
}
