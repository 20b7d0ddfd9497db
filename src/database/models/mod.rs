pub mod todo_item;

pub use todo_item::{NewTodoItem, TodoItem, TodoItemChanges, TodoItemFilter, TodoItemQuery};
