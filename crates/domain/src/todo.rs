use crate::errors::DomainError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// ToDo の識別子（作成時に一度だけ採番される）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// 外部入力（パスパラメータ等）から TodoId を生成
    pub fn from_string(id: String) -> Result<Self, DomainError> {
        if id.trim().is_empty() {
            return Err(DomainError::InvalidTodoId("TodoId が空です".to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TodoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ToDo の所有者（JWT の `sub` クレーム）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn from_string(id: String) -> Result<Self, DomainError> {
        if id.trim().is_empty() {
            return Err(DomainError::InvalidUserId("UserId が空です".to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 保存される ToDo アイテム
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub todo_id: TodoId,
    pub user_id: UserId,
    pub name: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
}

impl TodoItem {
    /// 新規作成リクエストから未完了の ToDo を組み立てる
    pub fn new(
        todo_id: TodoId,
        user_id: UserId,
        request: CreateTodoRequest,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            todo_id,
            user_id,
            name: request.name,
            created_at: format_timestamp(created_at),
            due_date: request.due_date,
            done: false,
            attachment_url: None,
        }
    }
}

/// 部分更新の内容
///
/// `created_at` にはフィールド名に反して更新要求の時刻が入る。
/// ストアには書き込まれない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoUpdate {
    pub todo_id: TodoId,
    pub user_id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub done: bool,
    pub created_at: String,
}

impl TodoUpdate {
    pub fn new(
        todo_id: TodoId,
        user_id: UserId,
        request: UpdateTodoRequest,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            todo_id,
            user_id,
            name: request.name,
            due_date: request.due_date,
            done: request.done,
            created_at: format_timestamp(requested_at),
        }
    }
}

/// POST /todos リクエスト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoRequest {
    pub name: String,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl CreateTodoRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_name(&self.name)
    }
}

/// PATCH /todos/{todoId} リクエスト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoRequest {
    pub name: String,
    #[serde(default)]
    pub due_date: Option<String>,
    pub done: bool,
}

impl UpdateTodoRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_name(&self.name)
    }
}

fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::Validation("name は必須です".to_string()));
    }
    Ok(())
}

/// ISO-8601（ミリ秒精度, `Z` 付き）形式のタイムスタンプ
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn user() -> UserId {
        UserId::from_string("user-1".to_string()).unwrap()
    }

    #[test]
    fn test_todo_id_new_generates_26_char_string() {
        // Act: 新しいTodoIdを生成
        let todo_id = TodoId::new();

        // Assert: 26文字のBase32形式であることを確認
        assert_eq!(todo_id.as_str().len(), 26);
        let valid_chars = "0123456789ABCDEFGHJKMNPQRSTVWXYZ";
        for c in todo_id.as_str().chars() {
            assert!(valid_chars.contains(c), "Invalid character: {c}");
        }
    }

    #[test]
    fn test_identifiers_reject_blank_input() {
        assert!(TodoId::from_string("  ".to_string()).is_err());
        assert!(UserId::from_string(String::new()).is_err());
        assert_eq!(
            TodoId::from_string("abc".to_string()).unwrap().as_str(),
            "abc"
        );
    }

    #[test]
    fn test_new_todo_item_is_not_done() {
        // Arrange
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let request = CreateTodoRequest {
            name: "Buy milk".to_string(),
            due_date: Some("2024-01-10".to_string()),
        };

        // Act
        let item = TodoItem::new(TodoId::new(), user(), request, now);

        // Assert
        assert!(!item.done);
        assert_eq!(item.name, "Buy milk");
        assert_eq!(item.user_id, user());
        assert_eq!(item.created_at, "2024-01-02T03:04:05.000Z");
        assert_eq!(item.due_date.as_deref(), Some("2024-01-10"));
        assert!(item.attachment_url.is_none());
    }

    #[test]
    fn test_todo_item_serializes_in_camel_case_without_empty_optionals() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let todo_id = TodoId::from_string("todo-1".to_string()).unwrap();
        let request = CreateTodoRequest {
            name: "Buy milk".to_string(),
            due_date: None,
        };
        let item = TodoItem::new(todo_id, user(), request, now);

        let value = serde_json::to_value(&item).unwrap();

        assert_eq!(
            value,
            json!({
                "todoId": "todo-1",
                "userId": "user-1",
                "name": "Buy milk",
                "createdAt": "2024-01-02T03:04:05.000Z",
                "done": false
            })
        );
    }

    #[test]
    fn test_update_request_requires_done_and_name() {
        let parsed: UpdateTodoRequest =
            serde_json::from_value(json!({"name": "Walk", "done": true})).unwrap();
        assert!(parsed.done);
        assert!(parsed.due_date.is_none());

        let missing_done = serde_json::from_value::<UpdateTodoRequest>(json!({"name": "Walk"}));
        assert!(missing_done.is_err());
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let request = CreateTodoRequest {
            name: "   ".to_string(),
            due_date: None,
        };
        assert!(matches!(request.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_todo_update_stamps_request_time() {
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let request = UpdateTodoRequest {
            name: "Walk".to_string(),
            due_date: None,
            done: true,
        };

        let update = TodoUpdate::new(TodoId::new(), user(), request, at);

        assert_eq!(update.created_at, "2024-05-06T07:08:09.000Z");
        assert!(update.done);
    }
}
